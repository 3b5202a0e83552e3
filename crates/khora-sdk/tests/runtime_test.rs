// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{bail, Result};
use khora_sdk::prelude::*;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// --- Test Setup ---
fn config_for(root: &std::path::Path) -> RuntimeConfig {
    RuntimeConfig {
        asset_root: root.to_path_buf(),
        async_worker_threads: 2,
        ..RuntimeConfig::default()
    }
}

fn tick_until(runtime: &mut Runtime, handles: &[&GoalHandle]) -> Result<()> {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handles.iter().all(|h| h.is_finished()) {
        if Instant::now() > deadline {
            bail!("goals did not finish in time");
        }
        runtime.tick_measured()?;
        thread::sleep(Duration::from_millis(1));
    }
    Ok(())
}
// ---

#[test]
fn test_streams_from_asset_directory() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::create_dir(dir.path().join("textures"))?;
    std::fs::write(dir.path().join("textures/grass.png"), b"png!")?;
    std::fs::write(dir.path().join("level.json"), b"{}")?;

    let mut runtime = Runtime::new(config_for(dir.path()))?;
    runtime.init()?;

    let received = Arc::new(Mutex::new(Vec::new()));
    let on_owner = received.clone();
    let on_worker = received.clone();
    let owner_thread = thread::current().id();

    let grass = runtime.stream(
        StreamGoal::new("textures/grass.png", move |bytes| {
            assert_eq!(thread::current().id(), owner_thread);
            on_owner.lock().unwrap().push(("grass", bytes));
        })
        .route_to_owning_thread(true),
    );
    let level = runtime.stream(StreamGoal::new("level.json", move |bytes| {
        on_worker.lock().unwrap().push(("level", bytes));
    }));
    let (missing_tx, missing_rx) = crossbeam_channel::bounded(1);
    let ghost = runtime.stream(
        StreamGoal::new("ghost.bin", |_| {}).on_missing(move || missing_tx.send(()).unwrap()),
    );

    tick_until(&mut runtime, &[&grass, &level, &ghost])?;
    missing_rx.recv_timeout(Duration::from_secs(1))?;

    assert_eq!(grass.status(), GoalStatus::Complete);
    assert_eq!(level.status(), GoalStatus::Complete);
    assert_eq!(ghost.status(), GoalStatus::Missing);

    let mut received = received.lock().unwrap().clone();
    received.sort();
    assert_eq!(
        received,
        vec![("grass", b"png!".to_vec()), ("level", b"{}".to_vec())]
    );

    runtime.shutdown()?;
    Ok(())
}

#[test]
fn test_async_chain_through_runtime() -> Result<()> {
    let mut runtime = Runtime::with_storage(RuntimeConfig::default(), Arc::new(MemoryStorage::new()))?;
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let order = Arc::new(Mutex::new(Vec::new()));

    let scheduler = runtime.scheduler().clone();
    let tail_order = order.clone();
    let tail = scheduler.add_async_task(
        move || {
            tail_order.lock().unwrap().push("tail");
            done_tx.send(()).unwrap();
        },
        None,
    );
    let head_order = order.clone();
    let head = scheduler.start_async_task(move || head_order.lock().unwrap().push("head"), true);
    head.follow_with(tail);

    done_rx.recv_timeout(Duration::from_secs(5))?;
    assert_eq!(*order.lock().unwrap(), vec!["head", "tail"]);

    // Nothing was routed to the owning thread.
    assert_eq!(runtime.tick(0.0)?, 0);
    Ok(())
}
