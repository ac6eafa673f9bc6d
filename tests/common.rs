//! Shared fixtures for module host integration tests
//!
//! Provides an isolated on-disk module tree plus recording doubles for
//! the script runner and note sink.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use modhost::{HostConfig, ModuleError, NoteSink, ScriptRunner};

/// Test fixture holding an isolated `<Vendor>/<Module>` tree and data directory
pub struct HostFixture {
    /// Temporary directory, dropped (and deleted) with the fixture
    pub temp_dir: TempDir,
    /// Root scanned for modules
    pub modules_dir: PathBuf,
    /// Durable store and enablement cache location
    pub data_dir: PathBuf,
}

impl HostFixture {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;

        let modules_dir = temp_dir.path().join("modules");
        let data_dir = temp_dir.path().join("data");
        std::fs::create_dir_all(&modules_dir)?;
        std::fs::create_dir_all(&data_dir)?;

        Ok(Self {
            temp_dir,
            modules_dir,
            data_dir,
        })
    }

    /// Configuration pointing at the fixture directories
    pub fn config(&self) -> HostConfig {
        HostConfig {
            modules_dir: self.modules_dir.display().to_string(),
            data_dir: self.data_dir.display().to_string(),
            disabled_cache_file: self.cache_path().display().to_string(),
            ..HostConfig::default()
        }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("disabled.json")
    }

    /// Directory a `Vendor.Module` identifier maps to
    pub fn module_dir(&self, identifier: &str) -> PathBuf {
        let (vendor, module) = identifier
            .split_once('.')
            .expect("identifier must be Vendor.Module");
        self.modules_dir.join(vendor).join(module)
    }

    /// Create a module directory with a definition file
    pub fn create_module(&self, identifier: &str, requires: &[&str]) -> PathBuf {
        self.create_module_with(identifier, requires, false)
    }

    /// Create a module whose hooks run even under the no-init flag
    pub fn create_elevated_module(&self, identifier: &str, requires: &[&str]) -> PathBuf {
        self.create_module_with(identifier, requires, true)
    }

    fn create_module_with(&self, identifier: &str, requires: &[&str], elevated: bool) -> PathBuf {
        let dir = self.module_dir(identifier);
        std::fs::create_dir_all(&dir).expect("create module directory");

        let module = identifier.split_once('.').unwrap().1;
        let mut definition = format!("name = \"{}\"\n", module);
        if !requires.is_empty() {
            let list = requires
                .iter()
                .map(|require| format!("\"{}\"", require))
                .collect::<Vec<_>>()
                .join(", ");
            definition.push_str(&format!("requires = [{}]\n", list));
        }
        if elevated {
            definition.push_str("elevated = true\n");
        }

        std::fs::write(dir.join("module.toml"), definition).expect("write definition");
        dir
    }

    /// Write a module's version manifest
    pub fn write_manifest(&self, identifier: &str, contents: &str) {
        let updates = self.module_dir(identifier).join("updates");
        std::fs::create_dir_all(&updates).expect("create updates directory");
        std::fs::write(updates.join("version.toml"), contents).expect("write manifest");
    }

    /// Write a migration script file under the module's updates directory
    pub fn write_script(&self, identifier: &str, name: &str) {
        let updates = self.module_dir(identifier).join("updates");
        std::fs::create_dir_all(&updates).expect("create updates directory");
        std::fs::write(updates.join(name), "-- migration placeholder\n").expect("write script");
    }
}

/// Script runner that records every invocation as `"up <module> <file>"`
/// or `"down <module> <file>"`
#[derive(Clone, Default)]
pub struct RecordingRunner {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn script_name(script: &Path) -> String {
    script
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl ScriptRunner for RecordingRunner {
    fn run_up(&self, module: &str, script: &Path) -> Result<(), ModuleError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("up {} {}", module, script_name(script)));
        Ok(())
    }

    fn run_down(&self, module: &str, script: &Path) -> Result<(), ModuleError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("down {} {}", module, script_name(script)));
        Ok(())
    }
}

/// Note sink collecting streamed lines for assertions
#[derive(Clone, Default)]
pub struct CollectingSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl NoteSink for CollectingSink {
    fn write_note(&mut self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
