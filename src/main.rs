use clap::{Parser, Subcommand};
use patternforge::config::{self, BuildConfig, DEFAULT_USER, Mode};
use patternforge::graph::{Target, TaskGraph};
use patternforge::reload::ReloadHub;
use patternforge::runner::{self, BuildContext};
use patternforge::{output, serve};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "patternforge")]
#[command(about = "Build tool for static pattern libraries and styleguides")]
#[command(long_about = "\
Build tool for static pattern libraries and styleguides

Compiles Sass, bundles CommonJS scripts, turns SVG folders into sprites,
copies fonts and images, extracts Sass variables and assembles handlebars
views into a static site. In dev mode it then serves the result and
rebuilds whatever you edit.

Project structure (defaults):

  project/
  ├── patternforge.toml              # optional, sparse overrides
  ├── src/
  │   ├── assets/
  │   │   ├── fabricator/            # library chrome: styles, scripts
  │   │   └── toolkit/               # your toolkit: styles, scripts, svgs,
  │   │                              #   fonts, images
  │   ├── data/                      # *.json / *.yml template data
  │   ├── docs/                      # *.md
  │   ├── materials/                 # 01-components/02-button.html ...
  │   └── views/                     # pages; layouts/ holds layouts
  └── dist/                          # output

Run 'patternforge targets' for the task list and
'patternforge gen-config' for a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Dev mode: expanded CSS, source maps, live reload, serve after build
    #[arg(long, env = "PATTERNFORGE_DEV", global = true)]
    dev: bool,

    /// Account used for sftp/sync uploads
    #[arg(long, env = "PATTERNFORGE_USER", default_value = DEFAULT_USER, global = true)]
    user: String,

    /// Debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a target (task or composite)
    Run {
        #[arg(default_value = "default")]
        target: String,
    },
    /// Print the stages a target would run
    Plan {
        #[arg(default_value = "default")]
        target: String,
    },
    /// List task and target names
    Targets,
    /// Print a stock patternforge.toml with all options documented
    GenConfig,
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("patternforge=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("patternforge=info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Command::Targets => output::print_targets(),
        Command::GenConfig => print!("{}", config::stock_config_toml()),
        Command::Plan { target } => {
            let plan = TaskGraph::standard().plan(&target.parse::<Target>()?.roots())?;
            output::print_plan(&target, &plan);
        }
        Command::Run { target: name } => {
            let target: Target = name.parse()?;
            let mode = Mode::from_flag(cli.dev);
            let config = BuildConfig::load(&cli.root, mode, &cli.user)?;
            tracing::debug!(root = %config.root.display(), ?mode, user = %config.user, "Loaded config");

            let hub = ReloadHub::new();
            let mut ctx = BuildContext::new(config);
            if ctx.config.is_dev() {
                ctx = ctx.with_reloader(Arc::new(hub.clone()));
            }

            if target != Target::Serve {
                let plan = TaskGraph::standard().plan(&target.roots())?;
                let (tx, rx) = std::sync::mpsc::channel();
                let printer = std::thread::spawn(move || {
                    for event in rx {
                        println!("{}", output::format_run_event(&event));
                    }
                });
                let report = runner::run_plan(&ctx, &plan, Some(&tx));
                drop(tx);
                printer.join().ok();
                output::print_report(&report);
                report.into_result()?;
            }

            let serve_after = target == Target::Serve || (target == Target::Default && ctx.config.is_dev());
            if serve_after {
                let runtime = tokio::runtime::Runtime::new()?;
                runtime.block_on(serve::serve(ctx, hub))?;
            }
        }
    }

    Ok(())
}
