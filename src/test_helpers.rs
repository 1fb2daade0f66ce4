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

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use once_cell::sync::Lazy;

use crate::charm::CharmRef;
use crate::model::{DeployOptions, Error, Model, ModelFactory};
use crate::status::Status;
use crate::telemetry;

// Ensure that the `tracing` stack is only initialised once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(telemetry::setup_logging);

pub fn initialize_telemetry() {
    Lazy::force(&TRACING);
}

/// A call recorded by MockModel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Deploy {
        charm: String,
        app: Option<String>,
        options: DeployOptions,
    },
    Wait,
    Integrate(String, String),
    Cli(Vec<String>),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<Call>,
    // Keyed by subcommand.
    responses: HashMap<String, Result<String, String>>,
    status: Status,
    fail_deploys: bool,
    fail_integrations: bool,
}

/// MockModel records every call and answers `cli` from canned responses.
/// `wait` succeeds if the predicate holds for the configured status, and times out otherwise.
#[derive(Debug)]
pub struct MockModel {
    name: String,
    state: Mutex<MockState>,
}

fn command_error(command: String, stderr: &str) -> Error {
    Error::Command {
        command,
        code: Some(1),
        stderr: stderr.to_string(),
    }
}

impl MockModel {
    pub fn new(name: &str) -> Self {
        MockModel {
            name: name.to_string(),
            state: Default::default(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Set the response for `cli` calls whose first argument is `subcommand`.
    /// `Err` simulates a failing command with the given stderr.
    pub fn respond(&self, subcommand: &str, response: Result<&str, &str>) {
        self.state.lock().unwrap().responses.insert(
            subcommand.to_string(),
            response.map(str::to_string).map_err(str::to_string),
        );
    }

    /// Set the status seen by `wait`, as `juju status --format json` output.
    pub fn set_status(&self, raw: &str) {
        self.state.lock().unwrap().status =
            serde_json::from_str(raw).expect("invalid status json");
    }

    pub fn fail_deploys(&self) {
        self.state.lock().unwrap().fail_deploys = true;
    }

    pub fn fail_integrations(&self) {
        self.state.lock().unwrap().fail_integrations = true;
    }
}

impl Model for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn deploy(
        &self,
        charm: &CharmRef,
        app: Option<&str>,
        options: &DeployOptions,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deploys {
            return Err(command_error(format!("juju deploy {charm}"), "deploy failed"));
        }
        state.calls.push(Call::Deploy {
            charm: charm.to_string(),
            app: app.map(str::to_string),
            options: options.clone(),
        });
        Ok(())
    }

    fn wait(&self, ready: &dyn Fn(&Status) -> bool) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Wait);
        if ready(&state.status) {
            Ok(())
        } else {
            Err(Error::WaitTimeout {
                model: self.name.clone(),
                timeout: Duration::ZERO,
            })
        }
    }

    fn integrate(&self, a: &str, b: &str) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_integrations {
            return Err(command_error(
                format!("juju integrate {a} {b}"),
                "relation already exists",
            ));
        }
        state
            .calls
            .push(Call::Integrate(a.to_string(), b.to_string()));
        Ok(())
    }

    fn cli(&self, args: &[&str]) -> Result<String, Error> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(Call::Cli(args.iter().map(|a| a.to_string()).collect()));
        let command = format!("juju {}", args.join(" "));
        match args.first().and_then(|c| state.responses.get(*c)) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(stderr)) => Err(command_error(command, stderr)),
            None => Err(command_error(command, "no response configured")),
        }
    }
}

/// MockFactory hands out MockModels, creating them on first use.
#[derive(Debug)]
pub struct MockFactory {
    prefix: String,
    models: Mutex<HashMap<String, Arc<MockModel>>>,
}

impl MockFactory {
    pub fn new(prefix: &str) -> Self {
        MockFactory {
            prefix: prefix.to_string(),
            models: Default::default(),
        }
    }

    /// The model registered under `name`, creating it if needed.
    pub fn model(&self, name: &str) -> Arc<MockModel> {
        let model_name = if name.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}-{}", self.prefix, name)
        };
        self.models
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MockModel::new(&model_name)))
            .clone()
    }
}

impl ModelFactory for MockFactory {
    fn get_juju(&self, name: &str) -> Result<Arc<dyn Model>, Error> {
        Ok(self.model(name))
    }
}
