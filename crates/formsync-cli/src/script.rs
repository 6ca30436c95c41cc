use std::error::Error;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use std::time::Instant;

use formsync_controller::ControllerBuilder;
use formsync_controller::ControllerId;
use formsync_controller::MemoryFieldTree;
use formsync_controller::Store;
use formsync_core::Applied;
use formsync_core::Command;
use formsync_core::DiffLogger;
use formsync_core::ErrorMap;
use formsync_core::FormStatus;
use formsync_core::LoggerSettings;
use formsync_core::SyncConfig;
use formsync_core::SyncOverrides;
use formsync_core::Value;
use serde::Deserialize;
use serde::Serialize;

/// Workspace defaults read from `--config`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    pub sync: SyncConfig,
    pub logger: LoggerSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Script {
    pub initial: Value,
    pub attach: Option<AttachSpec>,
    pub steps: Vec<Step>,
}

/// The form mounted before the steps run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AttachSpec {
    #[serde(flatten)]
    pub config: SyncOverrides,
    pub ui: Value,
    /// Values a blank reset returns the controls to. Defaults to `ui`.
    pub defaults: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Dispatch {
        command: Command,
    },
    Edit {
        path: String,
        value: Value,
    },
    Blur {
        path: String,
    },
    Submit,
    Validation {
        status: FormStatus,
        #[serde(default)]
        errors: Option<ErrorMap>,
    },
    Tick {
        ms: u64,
    },
    Detach,
}

impl Step {
    pub fn label(&self) -> String {
        match self {
            Self::Dispatch { command } => format!("dispatch {} {}", command.kind_name(), command.slice),
            Self::Edit { path, value } => format!("edit {path} = {value}"),
            Self::Blur { path } => format!("blur {path}"),
            Self::Submit => "submit".to_string(),
            Self::Validation { status, .. } => format!("validation {}", status.label()),
            Self::Tick { ms } => format!("tick {ms}ms"),
            Self::Detach => "detach".to_string(),
        }
    }
}

pub fn load_script(path: &Path) -> Result<Script, Box<dyn Error>> {
    let raw = fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|extension| extension.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let script = match extension.as_str() {
        "json" => serde_json::from_str(&raw)?,
        "yaml" | "yml" => serde_yaml::from_str(&raw)?,
        other => return Err(format!("unsupported script format: `{other}`").into()),
    };
    Ok(script)
}

pub fn load_config(path: &Path) -> Result<CliConfig, Box<dyn Error>> {
    let raw = fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

/// Drives one store through a script on a virtual clock.
pub struct Replay {
    store: Store,
    form: Option<(ControllerId, MemoryFieldTree)>,
    start: Instant,
    elapsed: Duration,
}

impl Replay {
    pub fn new(script: &Script, config: &CliConfig) -> Result<Self, Box<dyn Error>> {
        let mut store = Store::new(script.initial.clone());
        store.add_observer(Box::new(DiffLogger::new(config.logger.clone())?));

        let form = match &script.attach {
            Some(spec) => {
                let sync = spec.config.merge_over(&config.sync);
                let defaults = spec.defaults.clone().unwrap_or_else(|| spec.ui.clone());
                let tree = MemoryFieldTree::with_defaults(spec.ui.clone(), defaults);
                let id = store.attach(ControllerBuilder::new(sync).field_tree(tree.clone()))?;
                Some((id, tree))
            }
            None => None,
        };

        Ok(Self {
            store,
            form,
            start: Instant::now(),
            elapsed: Duration::ZERO,
        })
    }

    pub fn state(&self) -> &Value {
        self.store.state()
    }

    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    fn tree(&self, step: &Step) -> Result<&MemoryFieldTree, Box<dyn Error>> {
        match &self.form {
            Some((_, tree)) => Ok(tree),
            None => Err(format!("step `{}` needs an attached form", step.label()).into()),
        }
    }

    /// Runs one step, then lets the controller publish whatever settled.
    pub fn step(&mut self, step: &Step) -> Result<Vec<Applied>, Box<dyn Error>> {
        let mut applied = Vec::new();
        match step {
            Step::Dispatch { command } => applied.extend(self.store.dispatch(command.clone())),
            Step::Edit { path, value } => self.tree(step)?.edit(path, value.clone()),
            Step::Blur { path } => self.tree(step)?.blur(path),
            Step::Submit => self.tree(step)?.submit(),
            Step::Validation { status, errors } => {
                self.tree(step)?.set_validation(*status, errors.clone())
            }
            Step::Tick { ms } => self.elapsed += Duration::from_millis(*ms),
            Step::Detach => {
                let Some((id, _)) = self.form.take() else {
                    return Err("step `detach` needs an attached form".into());
                };
                applied.extend(self.store.detach(id)?);
            }
        }
        applied.extend(self.store.poll(self.now()));
        Ok(applied)
    }

    pub fn run(&mut self, script: &Script, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
        for (index, step) in script.steps.iter().enumerate() {
            writeln!(out, "[{}] {}", index + 1, step.label())?;
            for applied in self.step(step)? {
                writeln!(out, "    {}", describe(&applied))?;
            }
        }
        Ok(())
    }
}

fn describe(applied: &Applied) -> String {
    let command = &applied.command;
    let mut line = format!("{} {}", command.kind_name(), command.slice);
    if command.deferred {
        line.push_str(" (deferred)");
    }
    let difference = DiffLogger::difference(applied);
    for (label, part) in [
        ("added", &difference.added),
        ("removed", &difference.removed),
        ("changed", &difference.changed),
    ] {
        if let Some(part) = part {
            line.push_str(&format!(" {label}={part}"));
        }
    }
    line
}
