//! Command handlers behind the CLI surface.

use std::path::{Path, PathBuf};

use eiko_base::{EikoError, SourceMap};
use eiko_compile::{CompileOptions, CompileOutput, Compiler};
use eiko_deploy::{DeployOptions, Deployer, HandlerRegistry, TaskState};

use crate::manifest::{find_project_root, version_span, Manifest, PackageSpec};
use crate::package;

const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One-time tracing setup; `RUST_LOG` wins over the computed default.
pub fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Loads the manifest for the entry file's project, if one exists.
fn project_context(
    entry: &Path,
) -> Result<(Option<Manifest>, PathBuf), Box<dyn std::error::Error>> {
    let start = entry.parent().unwrap_or(Path::new("."));
    match find_project_root(start) {
        Some(root) => {
            let manifest_path = root.join("eiko.toml");
            let manifest = Manifest::load(&manifest_path)?;
            if let Err(err) = manifest.check_version(ENGINE_VERSION) {
                return Err(render_manifest_error(err, &manifest, &manifest_path).into());
            }
            package::check_requires(&manifest.requires()?, &root)?;
            Ok((Some(manifest), root))
        }
        None => Ok((None, start.to_path_buf())),
    }
}

/// Renders a spanned manifest diagnostic against the manifest source, the
/// same way compile errors render against `.eiko` files: the manifest is
/// registered as a source file and the span underlines the version value.
fn render_manifest_error(mut err: EikoError, manifest: &Manifest, path: &Path) -> String {
    let text = std::fs::read_to_string(path).unwrap_or_default();
    err.span = version_span(&text, &manifest.eiko.version);
    let mut sources = SourceMap::new();
    let file = sources.add(path.to_path_buf(), text);
    err.in_file(file).render(&sources)
}

fn compile_model(
    entry: &Path,
    root: &Path,
    plugin_stacktrace: bool,
) -> Result<(Compiler, CompileOutput), Box<dyn std::error::Error>> {
    let options = CompileOptions {
        plugin_stacktrace,
        package_roots: package::module_roots(root),
    };
    let mut compiler = Compiler::new(options);
    match compiler.compile_file(entry) {
        Ok(output) => Ok((compiler, output)),
        Err(errors) => {
            for error in &errors {
                eprintln!("{}\n", compiler.render_error(error));
            }
            Err(format!("compilation failed with {} error(s)", errors.len()).into())
        }
    }
}

pub fn compile(
    entry: &Path,
    output_model: bool,
    plugin_stacktrace: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (_, root) = project_context(entry)?;
    let (compiler, output) = compile_model(entry, &root, plugin_stacktrace)?;
    if output_model {
        println!("{}", serde_json::to_string_pretty(&output.graph.to_json())?);
    } else {
        println!(
            "compiled {} resource(s) into {} task(s)",
            compiler.resources.len(),
            output.graph.task_count()
        );
    }
    Ok(())
}

pub fn deploy(entry: &Path, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (manifest, root) = project_context(entry)?;
    let (_, output) = compile_model(entry, &root, false)?;

    let project = manifest.map(|m| m.eiko.project).unwrap_or_default();
    let options = DeployOptions {
        dry_run: dry_run || project.dry_run,
        step_timeout: project.ssh_timeout.map(std::time::Duration::from_secs),
        workspace: root.join(".eikobot").join("cache"),
        ..DeployOptions::default()
    };

    // Handlers come from host extensions; the standalone binary deploys
    // with an empty registry, leaving model-only resources as no-ops.
    let handlers = HandlerRegistry::new();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let deployer = Deployer::new(&output.graph, &handlers, options.clone());
    let cancel = deployer.cancel_token();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let report = runtime.block_on(deployer.run());

    for (id, task) in &report.tasks {
        let marker = match task.state {
            TaskState::Deployed => "deployed",
            TaskState::Failed => "FAILED",
            TaskState::Skipped => "skipped",
            _ => "pending",
        };
        println!("{marker:>9}  {id}");
        if options.dry_run && !task.changes.is_empty() {
            for (name, value) in &task.changes {
                println!("           ~ {name} = {}", value.display());
            }
        }
        if let Some(error) = &task.error {
            println!("           ! {error:?}");
        }
    }
    println!(
        "{} deployed, {} failed, {} skipped",
        report.count(TaskState::Deployed),
        report.count(TaskState::Failed),
        report.count(TaskState::Skipped),
    );

    if report.success() {
        Ok(())
    } else {
        Err("deploy finished with failures".into())
    }
}

pub fn project_init() -> Result<(), Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let manifest_path = cwd.join("eiko.toml");
    if manifest_path.exists() {
        return Err("eiko.toml already exists".into());
    }
    std::fs::write(
        &manifest_path,
        format!(
            "[eiko]\nversion = \"{ENGINE_VERSION}\"\n\n[eiko.project]\ndry_run = false\nrequires = []\n"
        ),
    )?;
    let entry = cwd.join("main.eiko");
    if !entry.exists() {
        std::fs::write(
            &entry,
            "resource Greeting:\n    name: str\n\nGreeting(\"world\")\n",
        )?;
    }
    println!("initialised project in {}", cwd.display());
    Ok(())
}

pub fn package_install(
    spec: Option<&str>,
    editable: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let cwd = std::env::current_dir()?;
    let root = find_project_root(&cwd).unwrap_or(cwd);

    match spec {
        None => {
            // No spec: install everything the manifest requires.
            let manifest = Manifest::load(&root.join("eiko.toml"))?;
            for spec in manifest.requires()? {
                let dest = package::install(&spec, &root)?;
                println!("installed {} -> {}", spec.module_name(), dest.display());
            }
            Ok(())
        }
        Some(".") => {
            let dest = package::install_local(&root, editable)?;
            println!("installed . -> {}", dest.display());
            Ok(())
        }
        Some(raw) => {
            let spec = PackageSpec::parse(raw)?;
            let dest = package::install(&spec, &root)?;
            println!("installed {raw} -> {}", dest.display());
            Ok(())
        }
    }
}

pub fn package_release(target: &str) -> Result<(), Box<dyn std::error::Error>> {
    if target != "github" {
        return Err(format!("unknown release target `{target}` (expected `github`)").into());
    }
    let cwd = std::env::current_dir()?;
    let root = find_project_root(&cwd)
        .ok_or("no eiko.toml found; run `eikobot project init` first")?;
    let manifest = Manifest::load(&root.join("eiko.toml"))?;
    let name = root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "package".to_string());
    let tarball = package::build_release(&root, &name, &manifest.eiko.version)?;
    println!("built {}", tarball.display());
    println!("upload it as a GitHub release asset tagged v{}", manifest.eiko.version);
    Ok(())
}
