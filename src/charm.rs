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

use std::fmt;
use std::path::{Path, PathBuf};

const CHARM_EXTENSION: &str = ".charm";

/// CharmRef identifies a charm to deploy: either a published name, or a packaged artifact on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CharmRef {
    Name(String),
    Path(PathBuf),
}

impl CharmRef {
    /// Resolves the published charm name.
    ///
    /// Packaged charms are named `<name>_<suffix>.charm`, where the suffix encodes the
    /// revision, base and architecture. Anything not ending in `.charm` is already a name.
    pub fn charm_name(&self) -> String {
        let s = self.to_string();
        if !s.ends_with(CHARM_EXTENSION) {
            return s;
        }
        let stem = Path::new(&s)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match stem.rsplit_once('_') {
            Some((name, _)) => name.to_string(),
            None => stem,
        }
    }
}

impl fmt::Display for CharmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharmRef::Name(n) => write!(f, "{n}"),
            CharmRef::Path(p) => write!(f, "{}", p.display()),
        }
    }
}

impl From<&str> for CharmRef {
    fn from(s: &str) -> Self {
        CharmRef::Name(s.to_string())
    }
}

impl From<String> for CharmRef {
    fn from(s: String) -> Self {
        CharmRef::Name(s)
    }
}

impl From<PathBuf> for CharmRef {
    fn from(p: PathBuf) -> Self {
        CharmRef::Path(p)
    }
}

impl From<&Path> for CharmRef {
    fn from(p: &Path) -> Self {
        CharmRef::Path(p.to_path_buf())
    }
}
