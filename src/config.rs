// Copyright Istio Authors
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

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::anyhow;

const MESH_CONFIG: &str = "MESH_CONFIG";
const MESH_BEACON_CHANNEL: &str = "MESH_BEACON_CHANNEL";
const MESH_CONTROL_PLANE_CHANNEL: &str = "MESH_CONTROL_PLANE_CHANNEL";
const MESH_CONTROL_PLANE_MODEL: &str = "MESH_CONTROL_PLANE_MODEL";

const DEFAULT_CHANNEL: &str = "2/edge";

/// CharmSpec pins a charm from the store to an application name and channel.
#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CharmSpec {
    pub charm: String,
    pub app: String,
    pub channel: String,
}

impl CharmSpec {
    fn new(charm: &str) -> Self {
        CharmSpec {
            charm: charm.to_string(),
            app: charm.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
        }
    }
}

#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Ingress charm deployed into the primary model. Mesh capable apps are related to it.
    pub beacon: CharmSpec,
    /// Istio control plane, deployed into `control_plane_model`.
    pub control_plane: CharmSpec,
    pub control_plane_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            beacon: CharmSpec::new("istio-beacon-k8s"),
            control_plane: CharmSpec::new("istio-k8s"),
            control_plane_model: "istio-system".to_string(),
        }
    }
}

/// Overrides holds optional settings layered on top of the default Config.
#[derive(serde::Deserialize, Default, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Overrides {
    pub beacon_channel: Option<String>,
    pub control_plane_channel: Option<String>,
    pub control_plane_model: Option<String>,
}

impl Overrides {
    fn merge(mut self, other: Self) -> Self {
        self.beacon_channel = other.beacon_channel.or(self.beacon_channel);
        self.control_plane_channel = other.control_plane_channel.or(self.control_plane_channel);
        self.control_plane_model = other.control_plane_model.or(self.control_plane_model);
        self
    }

    fn from_env() -> Result<Self, Error> {
        Ok(Overrides {
            beacon_channel: parse(MESH_BEACON_CHANNEL)?,
            control_plane_channel: parse(MESH_CONTROL_PLANE_CHANNEL)?,
            control_plane_model: parse(MESH_CONTROL_PLANE_MODEL)?,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid env var {0}={1}")]
    EnvVar(String, String),
    #[error("error parsing mesh config: {0}")]
    MeshConfig(anyhow::Error),
}

fn parse<T: FromStr>(env: &str) -> Result<Option<T>, Error> {
    match std::env::var(env) {
        Ok(val) => val
            .parse()
            .map(Some)
            .map_err(|_| Error::EnvVar(env.to_string(), val)),
        Err(_) => Ok(None),
    }
}

/// parse_config builds the mesh Config from an optional YAML file (`MESH_CONFIG`) and env vars.
/// Env vars take precedence over the file.
pub fn parse_config() -> Result<Config, Error> {
    let path = parse::<PathBuf>(MESH_CONFIG)?;
    let file = match path {
        Some(p) => read_overrides(&p).map_err(Error::MeshConfig)?,
        None => Overrides::default(),
    };
    Ok(construct_config(file.merge(Overrides::from_env()?)))
}

pub fn construct_config(o: Overrides) -> Config {
    let mut cfg = Config::default();
    if let Some(c) = empty_to_none(o.beacon_channel) {
        cfg.beacon.channel = c;
    }
    if let Some(c) = empty_to_none(o.control_plane_channel) {
        cfg.control_plane.channel = c;
    }
    if let Some(m) = empty_to_none(o.control_plane_model) {
        cfg.control_plane_model = m;
    }
    cfg
}

fn read_overrides(path: &Path) -> anyhow::Result<Overrides> {
    let f = fs::File::open(path).map_err(|e| anyhow!("failed to open {}: {}", path.display(), e))?;
    serde_yaml::from_reader(f).map_err(|e| anyhow!("failed parsing {}: {}", path.display(), e))
}

pub fn empty_to_none<A: AsRef<str>>(inp: Option<A>) -> Option<A> {
    if let Some(inner) = &inp {
        if inner.as_ref().is_empty() {
            return None;
        }
    }
    inp
}

#[cfg(test)]
pub mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = construct_config(Overrides::default());
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.beacon.charm, "istio-beacon-k8s");
        assert_eq!(cfg.beacon.app, "istio-beacon-k8s");
        assert_eq!(cfg.beacon.channel, "2/edge");
        assert_eq!(cfg.control_plane.charm, "istio-k8s");
        assert_eq!(cfg.control_plane.channel, "2/edge");
        assert_eq!(cfg.control_plane_model, "istio-system");
    }

    #[test]
    fn config_from_overrides() {
        // file only
        let file = read_overrides(Path::new("./src/test_helpers/mesh_config.yaml")).unwrap();
        let cfg = construct_config(file.clone());
        assert_eq!(cfg.beacon.channel, "2/stable");
        assert_eq!(cfg.control_plane.channel, "2/edge");
        assert_eq!(cfg.control_plane_model, "istio-mesh");

        // env wins over the file; empty values fall back
        let env = Overrides {
            beacon_channel: Some("2/candidate".to_string()),
            control_plane_channel: Some("2/beta".to_string()),
            control_plane_model: Some("".to_string()),
        };
        let cfg = construct_config(file.merge(env));
        assert_eq!(cfg.beacon.channel, "2/candidate");
        assert_eq!(cfg.control_plane.channel, "2/beta");
        assert_eq!(cfg.control_plane_model, "istio-system");
    }

    #[test]
    fn missing_config_file() {
        assert!(read_overrides(Path::new("./does/not/exist.yaml")).is_err());
    }

    #[test]
    fn config_from_env() {
        // The only test touching these variables, so nothing races with it.
        unsafe {
            std::env::set_var(MESH_CONFIG, "./src/test_helpers/mesh_config.yaml");
            std::env::set_var(MESH_BEACON_CHANNEL, "2/candidate");
        }
        let cfg = parse_config().unwrap();
        assert_eq!(cfg.beacon.channel, "2/candidate");
        assert_eq!(cfg.control_plane.channel, "2/edge");
        assert_eq!(cfg.control_plane_model, "istio-mesh");

        unsafe {
            std::env::set_var(MESH_CONFIG, "./does/not/exist.yaml");
        }
        assert!(matches!(parse_config(), Err(Error::MeshConfig(_))));

        unsafe {
            std::env::remove_var(MESH_CONFIG);
            std::env::remove_var(MESH_BEACON_CHANNEL);
        }
        assert_eq!(parse_config().unwrap(), Config::default());
    }
}
