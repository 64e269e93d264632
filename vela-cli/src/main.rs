use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};

use vela_core::differ::create_plan;
use vela_core::effect::Effect;
use vela_core::graph::sort_resources;
use vela_core::plan::Plan;
use vela_core::provider::Provider;
use vela_core::resource::{RemoteState, Resource, ResourceId, Value};
use vela_provider_aws::AwsProvider;
use vela_provider_aws::convert::{json_to_value, value_to_json};
use vela_state::{
    BackendConfig, LockInfo, ResourceState, StateBackend, StateFile, create_backend,
};
use vela_topology::{DeploymentConfig, SecretMaterial, Topology, validate};

#[derive(Parser)]
#[command(name = "vela")]
#[command(about = "Declarative deployment of a load-balanced container fleet", long_about = None)]
struct Cli {
    /// Path to the deployment configuration file
    #[arg(short, long, global = true, default_value = "deploy.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and the topology it builds
    Validate,
    /// Show the execution plan without applying changes
    Plan,
    /// Apply changes to reach the declared topology
    Apply {
        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy all managed resources
    Destroy {
        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Print apply outputs (e.g., the load balancer DNS name)
    Output,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate => run_validate(&cli.config).await,
        Commands::Plan => run_plan(&cli.config).await,
        Commands::Apply { auto_approve } => run_apply(&cli.config, auto_approve).await,
        Commands::Destroy { auto_approve } => run_destroy(&cli.config, auto_approve).await,
        Commands::Output => run_output(&cli.config).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

// =============================================================================
// Workspace Loading
// =============================================================================

struct Workspace {
    config: DeploymentConfig,
    backend: Box<dyn StateBackend>,
    state: StateFile,
    topology: Topology,
}

async fn load_workspace(config_path: &PathBuf) -> Result<Workspace, String> {
    let config = DeploymentConfig::from_file(config_path).map_err(|e| e.to_string())?;

    let backend = create_backend(&backend_config(&config))
        .await
        .map_err(|e| e.to_string())?;
    let state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();

    // The database password is generated exactly once; later applies reuse
    // the recorded value so the declaration stays unchanged.
    let prior_password = state
        .find_by_binding("db")
        .and_then(|r| r.attribute_str("password"))
        .map(str::to_string);
    let material = SecretMaterial::reuse_or_generate(prior_password.as_deref());

    let topology = Topology::build(&config, &material);
    if let Err(errors) = validate(&topology) {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(messages.join("\n"));
    }

    Ok(Workspace {
        config,
        backend,
        state,
        topology,
    })
}

fn backend_config(config: &DeploymentConfig) -> BackendConfig {
    let mut attributes = HashMap::new();
    match config.state.backend.as_str() {
        "s3" => {
            if let Some(bucket) = &config.state.bucket {
                attributes.insert("bucket".to_string(), bucket.clone());
            }
            if let Some(key) = &config.state.key {
                attributes.insert("key".to_string(), key.clone());
            }
            attributes.insert("region".to_string(), config.region.clone());
        }
        _ => {
            if let Some(path) = &config.state.path {
                attributes.insert("path".to_string(), path.clone());
            }
        }
    }

    BackendConfig {
        backend_type: config.state.backend.clone(),
        attributes,
    }
}

// =============================================================================
// Commands
// =============================================================================

async fn run_validate(config_path: &PathBuf) -> Result<(), String> {
    let workspace = load_workspace(config_path).await?;
    println!(
        "{} {} resources validated.",
        "Success!".green().bold(),
        workspace.topology.resources.len()
    );
    Ok(())
}

async fn run_plan(config_path: &PathBuf) -> Result<(), String> {
    let workspace = load_workspace(config_path).await?;
    let provider = AwsProvider::new(&workspace.config.region).await;

    let (plan, _) = build_plan(&workspace, &provider).await?;
    print_plan(&plan);
    Ok(())
}

async fn run_apply(config_path: &PathBuf, auto_approve: bool) -> Result<(), String> {
    let mut workspace = load_workspace(config_path).await?;
    let provider = AwsProvider::new(&workspace.config.region).await;

    let lock = workspace
        .backend
        .acquire_lock("apply")
        .await
        .map_err(|e| e.to_string())?;

    let result = apply_locked(&mut workspace, &provider, auto_approve).await;

    release(&workspace, &lock).await;
    result
}

async fn apply_locked(
    workspace: &mut Workspace,
    provider: &AwsProvider,
    auto_approve: bool,
) -> Result<(), String> {
    let (plan, mut binding_map) = build_plan(workspace, provider).await?;

    if plan.is_empty() {
        println!("{}", "No changes. Deployment is up-to-date.".green());
        print_outputs(&workspace.state);
        return Ok(());
    }

    print_plan(&plan);
    println!();

    if !auto_approve && !confirm("Do you want to apply these changes?")? {
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let mut success_count = 0;

    // Apply each effect in graph order, resolving references against the
    // bindings applied so far. The first failure stops the run: dependents
    // are never attempted, finished resources stay, and the state written
    // so far makes the partial apply re-appliable.
    for effect in plan.effects() {
        match execute_effect(workspace, provider, effect, &mut binding_map).await {
            Ok(()) => {
                println!("  {} {}", "✓".green(), format_effect(effect));
                success_count += 1;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(effect), e);
                println!();
                return Err(format!(
                    "Apply failed after {} of {} changes. Fix the error and re-apply.",
                    success_count,
                    plan.effects().len()
                ));
            }
        }
    }

    // Resolve declared outputs from the applied bindings
    let outputs = workspace.topology.outputs.clone();
    for output in outputs {
        if let Some(Value::String(value)) = binding_map
            .get(&output.binding)
            .and_then(|attrs| attrs.get(&output.attribute))
        {
            workspace.state.set_output(output.name, value.clone());
        }
    }
    write_state(workspace).await?;

    println!();
    println!(
        "{}",
        format!("Apply complete! {} changes applied.", success_count)
            .green()
            .bold()
    );
    print_outputs(&workspace.state);
    Ok(())
}

async fn run_destroy(config_path: &PathBuf, auto_approve: bool) -> Result<(), String> {
    let mut workspace = load_workspace(config_path).await?;
    let provider = AwsProvider::new(&workspace.config.region).await;

    let lock = workspace
        .backend
        .acquire_lock("destroy")
        .await
        .map_err(|e| e.to_string())?;

    let result = destroy_locked(&mut workspace, &provider, auto_approve).await;

    release(&workspace, &lock).await;
    result
}

async fn destroy_locked(
    workspace: &mut Workspace,
    provider: &AwsProvider,
    auto_approve: bool,
) -> Result<(), String> {
    // Managed resources recorded in state, in reverse apply order. Data
    // sources are looked up, never destroyed.
    let sorted =
        sort_resources(&workspace.topology.resources).map_err(|e| e.to_string())?;
    let destroy_order: Vec<&Resource> = sorted
        .iter()
        .rev()
        .filter(|r| !r.is_data_source())
        .filter(|r| {
            workspace
                .state
                .find_by_binding(&r.binding)
                .and_then(|s| s.identifier.as_ref())
                .is_some()
        })
        .collect();

    if destroy_order.is_empty() {
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for resource in &destroy_order {
        println!("  {} {}", "-".red().bold(), resource.id);
    }
    println!();
    println!(
        "Plan: {} to destroy.",
        destroy_order.len().to_string().red()
    );
    println!();

    if !auto_approve {
        println!(
            "{}",
            "Do you really want to destroy all resources?".yellow().bold()
        );
        if !confirm("This action cannot be undone.")? {
            println!("{}", "Destroy cancelled.".yellow());
            return Ok(());
        }
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let mut success_count = 0;

    for resource in destroy_order {
        let identifier = workspace
            .state
            .find_by_binding(&resource.binding)
            .and_then(|s| s.identifier.clone());

        let effect = Effect::Delete {
            id: resource.id.clone(),
            identifier: identifier.clone(),
        };

        match provider
            .delete(&resource.id, identifier.as_deref().unwrap_or(""))
            .await
        {
            Ok(()) => {
                println!("  {} {}", "✓".green(), format_effect(&effect));
                success_count += 1;
                workspace.state.remove_resource(&resource.binding);
                write_state(workspace).await?;
            }
            Err(e) => {
                println!("  {} {} - {}", "✗".red(), format_effect(&effect), e);
                println!();
                return Err(format!(
                    "Destroy failed after {} resources. Fix the error and re-run.",
                    success_count
                ));
            }
        }
    }

    workspace.state.outputs.clear();
    write_state(workspace).await?;

    println!();
    println!(
        "{}",
        format!("Destroy complete! {} resources destroyed.", success_count)
            .green()
            .bold()
    );
    Ok(())
}

async fn run_output(config_path: &PathBuf) -> Result<(), String> {
    let config = DeploymentConfig::from_file(config_path).map_err(|e| e.to_string())?;
    let backend = create_backend(&backend_config(&config))
        .await
        .map_err(|e| e.to_string())?;
    let state = backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default();

    if state.outputs.is_empty() {
        println!("{}", "No outputs recorded. Run apply first.".yellow());
        return Ok(());
    }

    let mut outputs: Vec<_> = state.outputs.iter().collect();
    outputs.sort();
    for (name, value) in outputs {
        println!("{} = {}", name.bold(), value);
    }
    Ok(())
}

// =============================================================================
// Planning
// =============================================================================

type BindingMap = HashMap<String, HashMap<String, Value>>;

/// Read observed state in graph order and diff it against the declaration
///
/// Returns the plan and the binding map seeded with everything already
/// known (recorded state merged with fresh reads).
async fn build_plan(
    workspace: &Workspace,
    provider: &AwsProvider,
) -> Result<(Plan, BindingMap), String> {
    let sorted = sort_resources(&workspace.topology.resources).map_err(|e| e.to_string())?;

    let mut binding_map = binding_map_from_state(&workspace.state);
    let mut current_states: HashMap<ResourceId, RemoteState> = HashMap::new();

    // Reads happen in graph order so each lookup sees its dependencies
    // resolved (the subnet lookup needs the network id, etc.).
    for resource in &sorted {
        let resolved = resolve_resource(resource, &binding_map);

        let identifier = workspace
            .state
            .find_by_binding(&resource.binding)
            .and_then(|s| s.identifier.clone());

        let state = provider
            .read(&resolved, identifier.as_deref())
            .await
            .map_err(|e| format!("Failed to read state: {}", e))?;

        if state.exists {
            let mut attrs = resolved.attributes.clone();
            for (k, v) in &state.attributes {
                attrs.insert(k.clone(), v.clone());
            }
            binding_map.insert(resource.binding.clone(), attrs);
        }
        current_states.insert(resource.id.clone(), state);
    }

    let resolved: Vec<Resource> = sorted
        .iter()
        .map(|r| resolve_resource(r, &binding_map))
        .collect();

    Ok((create_plan(&resolved, &current_states), binding_map))
}

/// Seed the binding map from recorded state
fn binding_map_from_state(state: &StateFile) -> BindingMap {
    let mut map = BindingMap::new();
    for resource in &state.resources {
        let mut attrs: HashMap<String, Value> = resource
            .attributes
            .iter()
            .filter_map(|(k, v)| json_to_value(v).map(|value| (k.clone(), value)))
            .collect();
        if let Some(identifier) = &resource.identifier {
            attrs
                .entry("id".to_string())
                .or_insert_with(|| Value::string(identifier));
        }
        map.insert(resource.binding.clone(), attrs);
    }
    map
}

/// Resolve every reference in a resource against the binding map
///
/// Unresolvable references are left in place; they only survive when the
/// target has not been created yet, in which case this resource is about
/// to be created after it anyway.
fn resolve_resource(resource: &Resource, binding_map: &BindingMap) -> Resource {
    let mut resolved = resource.clone();
    for (key, value) in &resource.attributes {
        resolved
            .attributes
            .insert(key.clone(), resolve_ref_value(value, binding_map));
    }
    resolved
}

fn resolve_ref_value(value: &Value, binding_map: &BindingMap) -> Value {
    match value {
        Value::Ref(binding, attribute) => match binding_map
            .get(binding)
            .and_then(|attrs| attrs.get(attribute))
        {
            Some(resolved) => resolved.clone(),
            None => value.clone(),
        },
        Value::List(items) => Value::List(
            items
                .iter()
                .map(|v| resolve_ref_value(v, binding_map))
                .collect(),
        ),
        Value::Map(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_ref_value(v, binding_map)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

// =============================================================================
// Apply Execution
// =============================================================================

async fn execute_effect(
    workspace: &mut Workspace,
    provider: &AwsProvider,
    effect: &Effect,
    binding_map: &mut BindingMap,
) -> Result<(), String> {
    let result_state = match effect {
        Effect::Create(resource) => {
            let resolved = resolve_resource(resource, binding_map);
            let state = provider
                .create(&resolved)
                .await
                .map_err(|e| e.to_string())?;
            Some((resource, resolved, state))
        }
        Effect::Update { id, from, to } => {
            let resolved = resolve_resource(to, binding_map);
            let identifier = from.identifier.as_deref().unwrap_or("");
            let state = provider
                .update(id, identifier, from, &resolved)
                .await
                .map_err(|e| e.to_string())?;
            Some((to, resolved, state))
        }
        Effect::Replace { id, from, to } => {
            if let Some(identifier) = from.identifier.as_deref() {
                provider
                    .delete(id, identifier)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            let resolved = resolve_resource(to, binding_map);
            let state = provider
                .create(&resolved)
                .await
                .map_err(|e| e.to_string())?;
            Some((to, resolved, state))
        }
        Effect::Delete { id, identifier } => {
            provider
                .delete(id, identifier.as_deref().unwrap_or(""))
                .await
                .map_err(|e| e.to_string())?;
            None
        }
    };

    match result_state {
        Some((declared, resolved, state)) => {
            // Merge observed attributes over the resolved declaration and
            // publish the binding for later references.
            let mut attrs = resolved.attributes.clone();
            for (k, v) in &state.attributes {
                attrs.insert(k.clone(), v.clone());
            }
            binding_map.insert(declared.binding.clone(), attrs.clone());

            if !declared.is_data_source() {
                let mut record = ResourceState::new(
                    declared.id.kind.clone(),
                    declared.id.name.clone(),
                    provider.name(),
                )
                .with_binding(declared.binding.clone());
                if let Some(identifier) = &state.identifier {
                    record = record.with_identifier(identifier.clone());
                }
                for (k, v) in &attrs {
                    if let Some(j) = value_to_json(v) {
                        record.attributes.insert(k.clone(), j);
                    }
                }
                workspace.state.upsert_resource(record);
                write_state(workspace).await?;
            }
        }
        None => {
            if let Effect::Delete { id, .. } = effect {
                let binding = workspace
                    .state
                    .resources
                    .iter()
                    .find(|r| r.kind == id.kind && r.name == id.name)
                    .map(|r| r.binding.clone());
                if let Some(binding) = binding {
                    workspace.state.remove_resource(&binding);
                    write_state(workspace).await?;
                }
            }
        }
    }

    Ok(())
}

async fn write_state(workspace: &mut Workspace) -> Result<(), String> {
    workspace.state.increment_serial();
    workspace
        .backend
        .write_state(&workspace.state)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

async fn release(workspace: &Workspace, lock: &LockInfo) {
    if let Err(e) = workspace.backend.release_lock(lock).await {
        eprintln!("{} failed to release state lock: {}", "Warning:".yellow(), e);
    }
}

// =============================================================================
// Display
// =============================================================================

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Deployment is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".bold());
    println!();

    for effect in plan.effects() {
        match effect {
            Effect::Create(resource) => {
                println!("  {} {}", "+".green().bold(), resource.id);
            }
            Effect::Update { id, from, to } => {
                println!("  {} {}", "~".yellow().bold(), id);
                print_attribute_changes(from, to);
            }
            Effect::Replace { id, from, to } => {
                println!("  {} {}", "±".red().bold(), id);
                print_attribute_changes(from, to);
            }
            Effect::Delete { id, .. } => {
                println!("  {} {}", "-".red().bold(), id);
            }
        }
    }

    println!();
    println!("{}", plan.summary());
}

fn print_attribute_changes(from: &RemoteState, to: &Resource) {
    let mut names: Vec<&String> = to.attributes.keys().collect();
    names.sort();

    for name in names {
        if name.starts_with('_') {
            continue;
        }
        let desired = &to.attributes[name];
        if matches!(desired, Value::Ref(_, _)) {
            continue;
        }
        let current = from.attributes.get(name);
        if current == Some(desired) {
            continue;
        }

        // Rendered scripts change as whole blocks; show them as a line diff
        if let (Some(Value::String(old)), Value::String(new)) = (current, desired)
            && old.contains('\n')
        {
            println!("      {}:", name.bold());
            print_text_diff(old, new);
            continue;
        }

        match current {
            Some(old) => println!(
                "      {}: {} -> {}",
                name.bold(),
                format_value(old).red(),
                format_value(desired).green()
            ),
            None => println!("      {}: {}", name.bold(), format_value(desired).green()),
        }
    }
}

fn print_text_diff(original: &str, updated: &str) {
    let diff = TextDiff::from_lines(original, updated);
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => print!("        {}{}", "-".red(), change.to_string().red()),
            ChangeTag::Insert => print!("        {}{}", "+".green(), change.to_string().green()),
            ChangeTag::Equal => {}
        }
    }
}

fn format_effect(effect: &Effect) -> String {
    match effect {
        Effect::Create(r) => format!("+ {}", r.id),
        Effect::Update { id, .. } => format!("~ {}", id),
        Effect::Replace { id, .. } => format!("± {}", id),
        Effect::Delete { id, .. } => format!("- {}", id),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => {
            if s.len() > 50 {
                format!("\"{}...\"", &s[..47])
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            if items.len() <= 3 {
                let strs: Vec<_> = items.iter().map(format_value).collect();
                format!("[{}]", strs.join(", "))
            } else {
                format!("[{} items]", items.len())
            }
        }
        Value::Map(map) => format!("{{...{} keys}}", map.len()),
        Value::Ref(binding, attr) => format!("{}.{}", binding, attr),
    }
}

fn print_outputs(state: &StateFile) {
    if state.outputs.is_empty() {
        return;
    }
    println!();
    println!("{}", "Outputs:".bold());
    let mut outputs: Vec<_> = state.outputs.iter().collect();
    outputs.sort();
    for (name, value) in outputs {
        println!("  {} = {}", name, value);
    }
}

fn confirm(message: &str) -> Result<bool, String> {
    println!("  {}", format!("{} Type 'yes' to confirm.", message).yellow());
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();

    Ok(input.trim() == "yes")
}
