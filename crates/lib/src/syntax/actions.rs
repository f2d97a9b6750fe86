//! Static registry of the device actions a script may invoke.

use std::fmt;

use super::ValueKind;
use crate::consts::DEFAULT_BRANCH;

/// Every action the runtime knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
  Flash,
  ApplyImage,
  InjectDrivers,
  EnableDualBoot,
  DisableDualBoot,
  DisplayMarkdown,
  FetchRepository,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
  pub name: &'static str,
  pub kind: ValueKind,
  /// Text default used when the argument is omitted.
  pub default: Option<&'static str>,
}

impl ParamSpec {
  const fn required(name: &'static str, kind: ValueKind) -> Self {
    Self {
      name,
      kind,
      default: None,
    }
  }

  const fn text_or(name: &'static str, default: &'static str) -> Self {
    Self {
      name,
      kind: ValueKind::Text,
      default: Some(default),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionSpec {
  pub kind: ActionKind,
  /// Name as written in scripts.
  pub name: &'static str,
  /// Progress description shown while the action runs.
  pub description: &'static str,
  pub params: &'static [ParamSpec],
}

const REGISTRY: &[ActionSpec] = &[
  ActionSpec {
    kind: ActionKind::Flash,
    name: "flash",
    description: "Flashing image",
    params: &[
      ParamSpec::required("image", ValueKind::Text),
      ParamSpec::required("disk", ValueKind::Disk),
    ],
  },
  ActionSpec {
    kind: ActionKind::ApplyImage,
    name: "applyImage",
    description: "Applying Windows image",
    params: &[
      ParamSpec::required("image", ValueKind::Wim),
      ParamSpec::required("disk", ValueKind::Disk),
    ],
  },
  ActionSpec {
    kind: ActionKind::InjectDrivers,
    name: "injectDrivers",
    description: "Injecting drivers",
    params: &[ParamSpec::required("origin", ValueKind::Text)],
  },
  ActionSpec {
    kind: ActionKind::EnableDualBoot,
    name: "enableDualBoot",
    description: "Enabling dual boot",
    params: &[ParamSpec::required("disk", ValueKind::Disk)],
  },
  ActionSpec {
    kind: ActionKind::DisableDualBoot,
    name: "disableDualBoot",
    description: "Disabling dual boot",
    params: &[ParamSpec::required("disk", ValueKind::Disk)],
  },
  ActionSpec {
    kind: ActionKind::DisplayMarkdown,
    name: "displayMarkdown",
    description: "Displaying Markdown document",
    params: &[ParamSpec::required("message", ValueKind::Text)],
  },
  ActionSpec {
    kind: ActionKind::FetchRepository,
    name: "fetchRepository",
    description: "Downloading repository",
    params: &[
      ParamSpec::required("url", ValueKind::Text),
      ParamSpec::text_or("branch", DEFAULT_BRANCH),
    ],
  },
];

/// Look up an action by its script name.
pub fn lookup(name: &str) -> Option<&'static ActionSpec> {
  REGISTRY.iter().find(|spec| spec.name == name)
}

/// All registered actions, in declaration order.
pub fn all() -> &'static [ActionSpec] {
  REGISTRY
}

impl ActionKind {
  pub fn spec(self) -> &'static ActionSpec {
    // rows are declared in variant order
    let row = match self {
      ActionKind::Flash => 0,
      ActionKind::ApplyImage => 1,
      ActionKind::InjectDrivers => 2,
      ActionKind::EnableDualBoot => 3,
      ActionKind::DisableDualBoot => 4,
      ActionKind::DisplayMarkdown => 5,
      ActionKind::FetchRepository => 6,
    };
    &REGISTRY[row]
  }

  pub fn name(self) -> &'static str {
    self.spec().name
  }

  pub fn description(self) -> &'static str {
    self.spec().description
  }
}

impl fmt::Display for ActionKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}
