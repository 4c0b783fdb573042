//! The build task graph.
//!
//! Tasks and their ordering live in an explicit [`TaskGraph`] value built
//! once at startup. Two edge kinds exist:
//!
//! - **requires**: scheduling the dependent also schedules the dependency
//!   (`assemble` always brings `sass-data` along);
//! - **after**: ordering only; applies when both tasks are already scheduled
//!   (every task runs after `clean`, but running `styles` alone does not
//!   clean).
//!
//! [`TaskGraph::plan`] resolves a set of root tasks into [`Plan`] stages.
//! Tasks inside one stage are independent and run concurrently; stages run
//! strictly in order.
//!
//! ```text
//! default:  [clean] → [styles:*, scripts, images, svgs, fonts] → [sass-data] → [assemble]
//! deploy:   … → [assemble] → [sftp]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Unknown target '{0}' (run `patternforge targets` for the list)")]
    UnknownTarget(String),
    #[error("Task graph has a cycle through: {0}")]
    Cycle(String),
}

/// A single build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    Clean,
    StylesFabricator,
    StylesToolkit,
    Scripts,
    Images,
    Svgs,
    Fonts,
    SassData,
    Assemble,
    Sftp,
    Sync,
}

impl Task {
    pub const ALL: [Task; 11] = [
        Task::Clean,
        Task::StylesFabricator,
        Task::StylesToolkit,
        Task::Scripts,
        Task::Images,
        Task::Svgs,
        Task::Fonts,
        Task::SassData,
        Task::Assemble,
        Task::Sftp,
        Task::Sync,
    ];

    /// The tasks a full build runs, in no particular order.
    pub const BUILD: [Task; 9] = [
        Task::Clean,
        Task::StylesFabricator,
        Task::StylesToolkit,
        Task::Scripts,
        Task::Images,
        Task::Svgs,
        Task::Fonts,
        Task::SassData,
        Task::Assemble,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::StylesFabricator => "styles:fabricator",
            Task::StylesToolkit => "styles:toolkit",
            Task::Scripts => "scripts",
            Task::Images => "images",
            Task::Svgs => "svgs",
            Task::Fonts => "fonts",
            Task::SassData => "sass-data",
            Task::Assemble => "assemble",
            Task::Sftp => "sftp",
            Task::Sync => "sync",
        }
    }

    /// A failure in a fatal task aborts the run; other failures are logged.
    pub fn is_fatal(self) -> bool {
        matches!(self, Task::Clean | Task::Sftp | Task::Sync)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Task {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Task::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| GraphError::UnknownTarget(s.to_string()))
    }
}

/// What the user asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Task(Task),
    /// Both style themes.
    Styles,
    /// Full build, then serve in dev mode.
    Default,
    /// Full build, then upload.
    Deploy,
    /// Serve the existing output without building.
    Serve,
}

impl Target {
    pub const COMPOSITES: [(&'static str, &'static str); 4] = [
        ("default", "full build; serve afterwards in dev mode"),
        ("deploy", "full build, then sftp"),
        ("styles", "styles:fabricator + styles:toolkit"),
        ("serve", "serve the output directory and watch sources"),
    ];

    /// Root tasks handed to [`TaskGraph::plan`].
    pub fn roots(self) -> Vec<Task> {
        match self {
            Target::Task(task) => vec![task],
            Target::Styles => vec![Task::StylesFabricator, Task::StylesToolkit],
            Target::Default => Task::BUILD.to_vec(),
            Target::Deploy => {
                let mut roots = Task::BUILD.to_vec();
                roots.push(Task::Sftp);
                roots
            }
            Target::Serve => Vec::new(),
        }
    }
}

impl FromStr for Target {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(Target::Default),
            "deploy" => Ok(Target::Deploy),
            "styles" => Ok(Target::Styles),
            "serve" => Ok(Target::Serve),
            other => other.parse().map(Target::Task),
        }
    }
}

/// Ordered stages of concurrently runnable tasks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    pub stages: Vec<Vec<Task>>,
}

impl Plan {
    /// Index of the stage containing `task`, if scheduled.
    pub fn stage_of(&self, task: Task) -> Option<usize> {
        self.stages.iter().position(|stage| stage.contains(&task))
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn tasks(&self) -> impl Iterator<Item = Task> + '_ {
        self.stages.iter().flatten().copied()
    }
}

/// Declared dependency ordering between named tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    requires: BTreeMap<Task, BTreeSet<Task>>,
    after: BTreeMap<Task, BTreeSet<Task>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard styleguide build graph.
    pub fn standard() -> Self {
        let mut graph = Self::new();
        let group = [
            Task::StylesFabricator,
            Task::StylesToolkit,
            Task::Scripts,
            Task::Images,
            Task::Svgs,
            Task::Fonts,
        ];

        for task in Task::ALL {
            if task != Task::Clean {
                graph.after(task, Task::Clean);
            }
        }
        // svgs writes the Sass partials the extractor reads; the rest of the
        // group is joined before extraction as well.
        for task in group {
            graph.after(Task::SassData, task);
        }
        graph.require(Task::Assemble, Task::SassData);
        for upload in [Task::Sftp, Task::Sync] {
            graph.after(upload, Task::Assemble);
            for task in group {
                graph.after(upload, task);
            }
        }
        graph
    }

    /// `task` needs `dependency`: scheduling one schedules both.
    pub fn require(&mut self, task: Task, dependency: Task) -> &mut Self {
        self.requires.entry(task).or_default().insert(dependency);
        self
    }

    /// When both are scheduled, `task` runs in a later stage than `before`.
    pub fn after(&mut self, task: Task, before: Task) -> &mut Self {
        self.after.entry(task).or_default().insert(before);
        self
    }

    /// Tasks that must finish before `task` when both are in `scheduled`.
    fn predecessors<'a>(
        &'a self,
        task: Task,
        scheduled: &'a BTreeSet<Task>,
    ) -> impl Iterator<Item = Task> + 'a {
        let requires = self.requires.get(&task).into_iter().flatten();
        let after = self.after.get(&task).into_iter().flatten();
        requires
            .chain(after)
            .copied()
            .filter(move |t| scheduled.contains(t))
    }

    /// Resolve `roots` into stages.
    ///
    /// The scheduled set is the closure of `roots` over *requires* edges.
    /// Each task lands in the stage after its latest predecessor (longest
    /// path layering), so independent tasks share a stage.
    pub fn plan(&self, roots: &[Task]) -> Result<Plan, GraphError> {
        let mut scheduled = BTreeSet::new();
        let mut pending: Vec<Task> = roots.to_vec();
        while let Some(task) = pending.pop() {
            if scheduled.insert(task)
                && let Some(deps) = self.requires.get(&task)
            {
                pending.extend(deps.iter().copied());
            }
        }

        let mut level: BTreeMap<Task, usize> = BTreeMap::new();
        let mut remaining: BTreeSet<Task> = scheduled.clone();
        while !remaining.is_empty() {
            let ready: Vec<Task> = remaining
                .iter()
                .copied()
                .filter(|t| self.predecessors(*t, &scheduled).all(|p| level.contains_key(&p)))
                .collect();
            if ready.is_empty() {
                let names: Vec<&str> = remaining.iter().map(|t| t.name()).collect();
                return Err(GraphError::Cycle(names.join(", ")));
            }
            for task in ready {
                let depth = self
                    .predecessors(task, &scheduled)
                    .map(|p| level[&p] + 1)
                    .max()
                    .unwrap_or(0);
                level.insert(task, depth);
                remaining.remove(&task);
            }
        }

        let depth = level.values().copied().max().map_or(0, |d| d + 1);
        let mut stages = vec![Vec::new(); depth];
        for (task, d) in level {
            stages[d].push(task);
        }
        Ok(Plan { stages })
    }
}
