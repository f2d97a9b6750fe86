//! Requirement types for discovery and resolution.
//!
//! - [`Requirement`] - an external input a script needs, found by static analysis
//! - [`RequirementRequest`] / [`RequirementResponse`] - one solver round-trip
//! - [`Assignment`] - the concrete value bound to a requirement key

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::syntax::{Value, ValueKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
  Disk,
  WimFile,
}

impl RequirementKind {
  /// Parse the kind annotation of an external reference (`@key:disk`).
  pub fn from_annotation(name: &str) -> Option<Self> {
    match name {
      "disk" => Some(RequirementKind::Disk),
      "wim" => Some(RequirementKind::WimFile),
      _ => None,
    }
  }

  /// Kind of the value an assignment of this requirement carries.
  pub fn value_kind(self) -> ValueKind {
    match self {
      RequirementKind::Disk => ValueKind::Disk,
      RequirementKind::WimFile => ValueKind::Wim,
    }
  }
}

impl fmt::Display for RequirementKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RequirementKind::Disk => write!(f, "disk"),
      RequirementKind::WimFile => write!(f, "wim"),
    }
  }
}

/// A named external input. Keys are unique within one script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
  pub key: String,
  pub kind: RequirementKind,
}

impl Requirement {
  pub fn new(key: impl Into<String>, kind: RequirementKind) -> Self {
    Self { key: key.into(), kind }
  }
}

impl fmt::Display for Requirement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "@{} ({})", self.key, self.kind)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementRequest {
  Disk { key: String },
  WimFile { key: String },
}

impl RequirementRequest {
  pub fn for_requirement(requirement: &Requirement) -> Self {
    let key = requirement.key.clone();
    match requirement.kind {
      RequirementKind::Disk => RequirementRequest::Disk { key },
      RequirementKind::WimFile => RequirementRequest::WimFile { key },
    }
  }

  pub fn key(&self) -> &str {
    match self {
      RequirementRequest::Disk { key } | RequirementRequest::WimFile { key } => key,
    }
  }

  pub fn kind(&self) -> RequirementKind {
    match self {
      RequirementRequest::Disk { .. } => RequirementKind::Disk,
      RequirementRequest::WimFile { .. } => RequirementKind::WimFile,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequirementResponse {
  Disk { key: String, index: u32 },
  /// `index` selects the image inside the WIM file.
  WimFile { key: String, path: PathBuf, index: u32 },
}

impl RequirementResponse {
  pub fn key(&self) -> &str {
    match self {
      RequirementResponse::Disk { key, .. } | RequirementResponse::WimFile { key, .. } => key,
    }
  }

  pub fn kind(&self) -> RequirementKind {
    match self {
      RequirementResponse::Disk { .. } => RequirementKind::Disk,
      RequirementResponse::WimFile { .. } => RequirementKind::WimFile,
    }
  }
}

/// A concrete value for one requirement key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
  pub key: String,
  pub value: Value,
}

impl Assignment {
  pub fn disk(key: impl Into<String>, index: u32) -> Self {
    Self {
      key: key.into(),
      value: Value::Disk { index },
    }
  }

  pub fn wim(key: impl Into<String>, path: impl Into<PathBuf>, index: u32) -> Self {
    Self {
      key: key.into(),
      value: Value::Wim {
        path: path.into(),
        index,
      },
    }
  }

  /// Requirement kind this assignment can satisfy, if any.
  pub fn kind(&self) -> Option<RequirementKind> {
    match self.value.kind() {
      ValueKind::Disk => Some(RequirementKind::Disk),
      ValueKind::Wim => Some(RequirementKind::WimFile),
      _ => None,
    }
  }
}

impl From<RequirementResponse> for Assignment {
  fn from(response: RequirementResponse) -> Self {
    match response {
      RequirementResponse::Disk { key, index } => Assignment::disk(key, index),
      RequirementResponse::WimFile { key, path, index } => Assignment::wim(key, path, index),
    }
  }
}

impl fmt::Display for Assignment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "@{} = {}", self.key, self.value)
  }
}
