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

/// Status is the subset of `juju status --format json` needed to judge readiness.
#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Status {
    pub applications: BTreeMap<String, ApplicationStatus>,
}

#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ApplicationStatus {
    pub application_status: StatusInfo,
    pub units: BTreeMap<String, UnitStatus>,
}

#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct UnitStatus {
    pub workload_status: StatusInfo,
    pub juju_status: StatusInfo,
}

#[derive(serde::Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct StatusInfo {
    pub current: String,
    pub message: Option<String>,
}

impl StatusInfo {
    pub fn new(current: &str) -> Self {
        StatusInfo {
            current: current.to_string(),
            message: None,
        }
    }
}

impl Status {
    fn units(&self) -> impl Iterator<Item = &UnitStatus> {
        self.applications.values().flat_map(|a| a.units.values())
    }
}

/// all_active reports whether every application and unit workload is active.
pub fn all_active(status: &Status) -> bool {
    status
        .applications
        .values()
        .all(|a| a.application_status.current == "active")
        && status.units().all(|u| u.workload_status.current == "active")
}

/// all_agents_idle reports whether every unit agent has settled.
pub fn all_agents_idle(status: &Status) -> bool {
    status.units().all(|u| u.juju_status.current == "idle")
}
