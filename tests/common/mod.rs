#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU32, Ordering},
};

use grid_duel::prelude::*;
use grid_duel::world::Grid;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// A directory under the system temp dir, removed on drop.
pub struct Scratch {
    root: PathBuf,
}

impl Scratch {
    pub fn new(name: &str) -> Scratch {
        static COUNTER: AtomicU32 = AtomicU32::new(0);
        let root = std::env::temp_dir().join(format!(
            "grid_duel_{name}_{}_{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::create_dir_all(&root).unwrap();
        Scratch { root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes a shell script and returns its path.
    pub fn script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.root.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        path
    }

    /// An agent running `body` through `/bin/sh`.
    pub fn agent(&self, name: &str, body: &str) -> AgentHandle {
        let script = self.script(&format!("{name}.sh"), body);
        AgentHandle::new("/bin/sh")
            .with_name(name)
            .with_args(vec![script.display().to_string()])
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// The absolute `path` spelled relative to the current directory.
pub fn relative_to_cwd(path: &Path) -> PathBuf {
    let cwd = std::env::current_dir().unwrap();
    let mut relative = PathBuf::new();
    for _ in cwd.components().skip(1) {
        relative.push("..");
    }
    relative.push(path.strip_prefix("/").unwrap());
    relative
}

pub fn init_test_logger() {
    let _ = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn open_world() -> World {
    World::new(Grid::from_rows(&["#####", "#   #", "#   #", "#   #", "#####"]).unwrap()).unwrap()
}
