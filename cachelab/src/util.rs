use std::error::Error;
use std::fs;
use std::path::PathBuf;
use regex::Regex;
use crate::config::SimulationConfig;
use crate::simulator::SimulationResult;

/// Directory holding the reference configurations, traces and expected outputs
pub fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

pub struct TestCasePaths {
    pub config: PathBuf,
    pub trace: PathBuf,
    pub output: PathBuf,
}

impl TestCasePaths {
    pub fn load_config(&self) -> Result<SimulationConfig, Box<dyn Error>> {
        Ok(serde_json::from_str(&fs::read_to_string(&self.config)?)?)
    }

    pub fn load_expected(&self) -> Result<SimulationResult, Box<dyn Error>> {
        Ok(serde_json::from_str(&fs::read_to_string(&self.output)?)?)
    }
}

/// Finds every expected output in the fixtures, along with the trace and configuration it was
/// produced from. Outputs are named `output-<trace>-<config>.json`
pub fn get_cases() -> Result<Vec<TestCasePaths>, Box<dyn Error>> {
    let root = fixtures_path();
    let output_pattern = Regex::new(r"^output-(?P<trace>[0-9a-zA-Z_]+)-(?P<config>[0-9a-zA-Z_]+)\.json$")?;
    let mut names = Vec::new();
    for entry in fs::read_dir(root.join("outputs"))? {
        let name = entry?
            .file_name()
            .into_string()
            .map_err(|e| format!("Can't convert OS string ({e:?}) to standard string"))?;
        if output_pattern.is_match(&name) {
            names.push(name);
        }
    }
    names.sort();

    let mut out = Vec::new();
    for name in names {
        let tokens = output_pattern.captures(&name).ok_or("Couldn't parse the file name")?;
        out.push(TestCasePaths {
            config: root.join("configs").join(format!("{}.json", &tokens["config"])),
            trace: root.join("traces").join(format!("{}.trace", &tokens["trace"])),
            output: root.join("outputs").join(&name),
        });
    }
    Ok(out)
}
