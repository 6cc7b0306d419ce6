use crate::error::SparkError;
use crate::platform::symlink::SymlinkOps;
use crate::platform::{grant_executable, EnvironmentInstaller};
use crate::runtime::Runtime;
use crate::shell::EnvPatch;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Reports which version of a runtime new processes will run.
pub trait VersionProbe {
    fn current(&self) -> Option<String>;
}

/// Spawns the runtime found on `PATH`.
pub struct CommandProbe<'a> {
    runtime: &'a dyn Runtime,
}

impl<'a> CommandProbe<'a> {
    pub fn new(runtime: &'a dyn Runtime) -> Self {
        Self { runtime }
    }
}

impl VersionProbe for CommandProbe<'_> {
    fn current(&self) -> Option<String> {
        self.runtime.probe()
    }
}

pub trait Sleeper {
    fn sleep(&self, interval: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, interval: Duration) {
        std::thread::sleep(interval);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationState {
    Switching,
    Active(String),
    /// Switched, but something about the switch could not be completed.
    Degraded(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentStatus {
    Unchanged,
    Installed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    AlreadyActive,
    Activated,
    EnvironmentFailed(String),
    Unconfirmed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    pub outcome: Outcome,
    pub state: ActivationState,
    pub environment: EnvironmentStatus,
    /// Probe attempts spent confirming the switch.
    pub attempts: u32,
}

pub struct ActivationRequest<'a> {
    pub version: &'a str,
    pub version_dir: &'a Path,
    pub symlink: &'a Path,
    pub patch: &'a EnvPatch,
}

pub struct ActivationController<'a> {
    probe: &'a dyn VersionProbe,
    links: &'a dyn SymlinkOps,
    installer: &'a dyn EnvironmentInstaller,
    sleeper: &'a dyn Sleeper,
    poll: PollSettings,
    process_env: fn(&str) -> Option<String>,
}

fn process_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

impl<'a> ActivationController<'a> {
    pub fn new(
        probe: &'a dyn VersionProbe,
        links: &'a dyn SymlinkOps,
        installer: &'a dyn EnvironmentInstaller,
    ) -> Self {
        Self {
            probe,
            links,
            installer,
            sleeper: &ThreadSleeper,
            poll: PollSettings::default(),
            process_env: process_var,
        }
    }

    pub fn with_poll(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Replaces the lookup used to decide whether the environment is stale.
    #[cfg(test)]
    pub fn with_process_env(mut self, lookup: fn(&str) -> Option<String>) -> Self {
        self.process_env = lookup;
        self
    }

    /// Switches the managed symlink to `request.version_dir`.
    ///
    /// Only a symlink that does not read back as requested is an error;
    /// environment failures and an unconfirmed switch are reported in the
    /// returned [`ActivationReport`].
    pub fn activate(&self, request: &ActivationRequest<'_>) -> Result<ActivationReport, SparkError> {
        if self.probe.current().as_deref() == Some(request.version) {
            debug!("{} is already active", request.version);
            return Ok(ActivationReport {
                outcome: Outcome::AlreadyActive,
                state: ActivationState::Active(request.version.to_string()),
                environment: EnvironmentStatus::Unchanged,
                attempts: 0,
            });
        }

        debug!("state {:?}", ActivationState::Switching);
        self.switch_link(request.symlink, request.version_dir)?;
        let environment = self.ensure_environment(request.patch);
        grant_executable(request.version_dir)?;
        let (confirmed, attempts) = self.confirm(request.version);

        let version = request.version.to_string();
        let (outcome, state) = match (&environment, confirmed) {
            (EnvironmentStatus::Failed(reason), _) => (
                Outcome::EnvironmentFailed(reason.clone()),
                ActivationState::Degraded(version, reason.clone()),
            ),
            (_, false) => (
                Outcome::Unconfirmed,
                ActivationState::Degraded(version, "activation unconfirmed".to_string()),
            ),
            (_, true) => (Outcome::Activated, ActivationState::Active(version)),
        };
        debug!("state {state:?}");
        Ok(ActivationReport {
            outcome,
            state,
            environment,
            attempts,
        })
    }

    fn switch_link(&self, link: &Path, target: &Path) -> Result<(), SparkError> {
        self.links.reset(link, target)?;
        match self.links.read(link)? {
            Some(actual) if actual == target => Ok(()),
            actual => Err(SparkError::OperationCancelled(format!(
                "{} points at {} instead of {}",
                link.display(),
                actual.map(|path| path.display().to_string()).unwrap_or_else(|| "nothing".into()),
                target.display()
            ))),
        }
    }

    fn ensure_environment(&self, patch: &EnvPatch) -> EnvironmentStatus {
        let stale: Vec<&str> = patch
            .set_vars
            .iter()
            .filter(|(key, value)| (self.process_env)(key).as_deref() != Some(value.as_str()))
            .map(|(key, _)| key.as_str())
            .collect();
        if stale.is_empty() {
            return EnvironmentStatus::Unchanged;
        }

        debug!("installing environment for {}", stale.join(", "));
        match self.installer.install(patch) {
            Ok(()) => EnvironmentStatus::Installed,
            Err(err) => {
                warn!("environment install failed: {err}");
                EnvironmentStatus::Failed(err.to_string())
            }
        }
    }

    fn confirm(&self, version: &str) -> (bool, u32) {
        for attempt in 1..=self.poll.attempts {
            if self.probe.current().as_deref() == Some(version) {
                return (true, attempt);
            }
            if attempt < self.poll.attempts {
                self.sleeper.sleep(self.poll.interval);
            }
        }
        (false, self.poll.attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::path::PathBuf;

    struct ScriptedProbe {
        answers: RefCell<VecDeque<Option<String>>>,
    }

    impl ScriptedProbe {
        fn new(answers: &[Option<&str>]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().map(|a| a.map(str::to_string)).collect()),
            }
        }
    }

    impl VersionProbe for ScriptedProbe {
        fn current(&self) -> Option<String> {
            self.answers.borrow_mut().pop_front().flatten()
        }
    }

    #[derive(Default)]
    struct FakeLinks {
        target: RefCell<Option<PathBuf>>,
        redirect: Option<PathBuf>,
        resets: Cell<u32>,
    }

    impl SymlinkOps for FakeLinks {
        fn read(&self, _link: &Path) -> Result<Option<PathBuf>, SparkError> {
            Ok(self.target.borrow().clone())
        }

        fn reset(&self, _link: &Path, target: &Path) -> Result<(), SparkError> {
            self.resets.set(self.resets.get() + 1);
            *self.target.borrow_mut() = Some(self.redirect.clone().unwrap_or_else(|| target.to_path_buf()));
            Ok(())
        }

        fn remove(&self, _link: &Path) -> Result<(), SparkError> {
            *self.target.borrow_mut() = None;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeInstaller {
        fail: bool,
        installs: Cell<u32>,
    }

    impl EnvironmentInstaller for FakeInstaller {
        fn install(&self, _patch: &EnvPatch) -> Result<(), SparkError> {
            self.installs.set(self.installs.get() + 1);
            if self.fail {
                return Err(SparkError::OperationCancelled("declined".into()));
            }
            Ok(())
        }

        fn uninstall(&self, _keys: &[String], _paths: &[String]) -> Result<(), SparkError> {
            Ok(())
        }

        fn reload_hint(&self) -> String {
            "reload".into()
        }
    }

    #[derive(Default)]
    struct CountingSleeper {
        sleeps: Cell<u32>,
    }

    impl Sleeper for CountingSleeper {
        fn sleep(&self, _interval: Duration) {
            self.sleeps.set(self.sleeps.get() + 1);
        }
    }

    fn no_env(_key: &str) -> Option<String> {
        None
    }

    fn env_up_to_date(key: &str) -> Option<String> {
        (key == "NODE_HOME").then(|| "/links/node".to_string())
    }

    fn patch() -> EnvPatch {
        let mut patch = EnvPatch::default();
        patch.set("NODE_HOME", "/links/node");
        patch.add_path("%NODE_HOME%/bin");
        patch
    }

    fn run(
        probe: &ScriptedProbe,
        links: &FakeLinks,
        installer: &FakeInstaller,
        sleeper: &CountingSleeper,
        env: fn(&str) -> Option<String>,
    ) -> Result<ActivationReport, SparkError> {
        let dir = tempfile::tempdir().expect("tempdir");
        let patch = patch();
        let request = ActivationRequest {
            version: "v20.9.0",
            version_dir: dir.path(),
            symlink: Path::new("/links/node"),
            patch: &patch,
        };
        ActivationController::new(probe, links, installer)
            .with_sleeper(sleeper)
            .with_poll(PollSettings {
                attempts: 3,
                interval: Duration::from_millis(500),
            })
            .with_process_env(env)
            .activate(&request)
    }

    #[test]
    fn already_active_version_is_a_no_op() {
        let probe = ScriptedProbe::new(&[Some("v20.9.0")]);
        let links = FakeLinks::default();
        let installer = FakeInstaller::default();
        let sleeper = CountingSleeper::default();

        let report = run(&probe, &links, &installer, &sleeper, no_env).expect("activate");
        assert_eq!(report.outcome, Outcome::AlreadyActive);
        assert_eq!(links.resets.get(), 0);
        assert_eq!(installer.installs.get(), 0);
    }

    #[test]
    fn redirected_symlink_is_cancelled() {
        let probe = ScriptedProbe::new(&[None]);
        let links = FakeLinks {
            redirect: Some(PathBuf::from("/somewhere/else")),
            ..FakeLinks::default()
        };
        let installer = FakeInstaller::default();
        let sleeper = CountingSleeper::default();

        let result = run(&probe, &links, &installer, &sleeper, no_env);
        assert!(matches!(result, Err(SparkError::OperationCancelled(_))));
        assert_eq!(installer.installs.get(), 0);
    }

    #[test]
    fn confirmed_switch_installs_stale_environment() {
        let probe = ScriptedProbe::new(&[Some("v18.0.0"), None, Some("v20.9.0")]);
        let links = FakeLinks::default();
        let installer = FakeInstaller::default();
        let sleeper = CountingSleeper::default();

        let report = run(&probe, &links, &installer, &sleeper, no_env).expect("activate");
        assert_eq!(report.outcome, Outcome::Activated);
        assert_eq!(report.environment, EnvironmentStatus::Installed);
        assert_eq!(report.state, ActivationState::Active("v20.9.0".into()));
        assert_eq!(report.attempts, 2);
        assert_eq!(sleeper.sleeps.get(), 1);
    }

    #[test]
    fn environment_failure_is_reported_not_raised() {
        let probe = ScriptedProbe::new(&[None, Some("v20.9.0")]);
        let links = FakeLinks::default();
        let installer = FakeInstaller {
            fail: true,
            ..FakeInstaller::default()
        };
        let sleeper = CountingSleeper::default();

        let report = run(&probe, &links, &installer, &sleeper, no_env).expect("activate");
        assert!(matches!(report.outcome, Outcome::EnvironmentFailed(_)));
        assert!(matches!(report.state, ActivationState::Degraded(..)));
    }

    #[test]
    fn unconfirmed_after_bounded_attempts() {
        let probe = ScriptedProbe::new(&[]);
        let links = FakeLinks::default();
        let installer = FakeInstaller::default();
        let sleeper = CountingSleeper::default();

        let report = run(&probe, &links, &installer, &sleeper, env_up_to_date).expect("activate");
        assert_eq!(report.outcome, Outcome::Unconfirmed);
        assert_eq!(report.environment, EnvironmentStatus::Unchanged);
        assert_eq!(installer.installs.get(), 0);
        assert_eq!(report.attempts, 3);
        assert_eq!(sleeper.sleeps.get(), 2);
    }
}
