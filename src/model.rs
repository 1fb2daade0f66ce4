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

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::charm::CharmRef;
use crate::status::Status;

/// Model is a handle to a single Juju model under test.
///
/// Implementations are expected to block until the underlying operation completes.
pub trait Model: Send + Sync {
    /// The name of the model. This is used as its identity.
    fn name(&self) -> &str;
    /// Deploy a charm into the model. `app` defaults to the charm name when unset.
    fn deploy(
        &self,
        charm: &CharmRef,
        app: Option<&str>,
        options: &DeployOptions,
    ) -> Result<(), Error>;
    /// Block until `ready` holds for the model status.
    fn wait(&self, ready: &dyn Fn(&Status) -> bool) -> Result<(), Error>;
    /// Relate two endpoints, given as `app[:endpoint]`.
    fn integrate(&self, a: &str, b: &str) -> Result<(), Error>;
    /// Run a raw juju command against the model, returning its stdout.
    fn cli(&self, args: &[&str]) -> Result<String, Error>;
}

/// ModelFactory hands out model handles by name, creating models on demand.
/// The empty name refers to the primary model of the test run.
pub trait ModelFactory {
    fn get_juju(&self, name: &str) -> Result<Arc<dyn Model>, Error>;
}

/// DeployOptions are the knobs passed along with a charm deployment.
#[derive(serde::Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct DeployOptions {
    pub channel: Option<String>,
    pub revision: Option<u64>,
    pub base: Option<String>,
    pub config: BTreeMap<String, String>,
    pub resources: BTreeMap<String, String>,
    pub num_units: Option<u32>,
    pub trust: bool,
}

impl DeployOptions {
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("command `{command}` exited with code={code:?}: {stderr}")]
    Command {
        command: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("model {model} was not ready after {timeout:?}")]
    WaitTimeout { model: String, timeout: Duration },
    #[error("{0}")]
    Unavailable(String),
}
