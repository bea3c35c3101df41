mod config;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use log::{debug, warn};

use cairn_core::differ::{
    create_destroy_plan, create_plan, create_refresh_plan, sort_by_dependencies,
};
use cairn_core::effect::Effect;
use cairn_core::interpreter::{ApplyResult, EffectOutcome, Interpreter};
use cairn_core::plan::Plan;
use cairn_core::provider::Provider;
use cairn_core::resource::{Resource, ResourceId, State, Value};
use cairn_core::retry::RetryPolicy;
use cairn_core::schema::ResourceSchema;
use cairn_provider_awscc::{AwsccProvider, schemas};
use cairn_state::{
    LocalBackend, LockInfo, StateBackend, StateFile, acquire_lock_with_retry,
};

use config::Config;

#[derive(Parser)]
#[command(name = "cairn")]
#[command(about = "Declarative cloud resource management over AWS Cloud Control", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = "cairn.json")]
    config: PathBuf,

    /// State file (overrides backend.path)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate,
    /// Show execution plan without applying changes
    Plan,
    /// Apply changes to reach the desired state
    Apply {
        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy every resource tracked in state
    Destroy {
        /// Skip confirmation prompt (auto-approve)
        #[arg(long)]
        auto_approve: bool,
    },
    /// Read back every tracked resource and update state
    Refresh,
    /// Adopt an existing remote object
    Import {
        /// Resource address (type.name)
        address: String,
        /// Provider-side identifier (e.g., vpc-0abc)
        identifier: String,
    },
    /// Inspect state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Release a lock left behind by an interrupted run
    ForceUnlock {
        lock_id: String,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// List tracked resources
    List,
    /// Show the recorded attributes of a resource
    Show {
        /// Resource address (type.name)
        address: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = &cli.config;
    let state = cli.state.as_deref();

    let result = match cli.command {
        Commands::Validate => run_validate(config),
        Commands::Plan => run_plan(config, state).await,
        Commands::Apply { auto_approve } => run_apply(config, state, auto_approve).await,
        Commands::Destroy { auto_approve } => run_destroy(config, state, auto_approve).await,
        Commands::Refresh => run_refresh(config, state).await,
        Commands::Import {
            address,
            identifier,
        } => run_import(config, state, &address, &identifier).await,
        Commands::State { command } => match command {
            StateCommands::List => run_state_list(config, state).await,
            StateCommands::Show { address } => run_state_show(config, state, &address).await,
        },
        Commands::ForceUnlock { lock_id } => run_force_unlock(config, state, &lock_id).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// =============================================================================
// Loading
// =============================================================================

fn get_schemas() -> HashMap<String, ResourceSchema> {
    schemas::definitions()
        .into_iter()
        .map(|d| (d.resource_type.to_string(), d.schema))
        .collect()
}

fn validate_resources(
    resources: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<(), String> {
    let mut all_errors = Vec::new();

    for resource in resources {
        let Some(schema) = schemas.get(&resource.id.resource_type) else {
            all_errors.push(format!(
                "{}: Unknown resource type '{}'",
                resource.id, resource.id.resource_type
            ));
            continue;
        };
        if let Err(errors) = schema.validate(&resource.attributes) {
            for error in errors {
                all_errors.push(format!("{}: {}", resource.id, error));
            }
        }
    }

    if let Err(e) = sort_by_dependencies(resources) {
        all_errors.push(e.to_string());
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(format!("Validation failed:\n  {}", all_errors.join("\n  ")))
    }
}

/// Validated desired resources with schema defaults filled in
fn load_desired(config: &Config, schemas: &HashMap<String, ResourceSchema>) -> Result<Vec<Resource>, String> {
    let mut resources = config.resources()?;
    validate_resources(&resources, schemas)?;
    for resource in &mut resources {
        if let Some(schema) = schemas.get(&resource.id.resource_type) {
            schema.apply_defaults(&mut resource.attributes);
        }
    }
    Ok(resources)
}

async fn get_interpreter(config: &Config) -> Result<Interpreter<Box<dyn Provider>>, String> {
    let provider = AwsccProvider::new(config.provider.clone())
        .await
        .map_err(|e| format!("Invalid provider configuration: {}", e))?;
    let provider: Box<dyn Provider> = Box::new(provider);
    Ok(Interpreter::new(provider))
}

fn get_backend(config: &Config, state_override: Option<&Path>) -> LocalBackend {
    let path = config.state_path(state_override);
    debug!("using state file {}", path.display());
    LocalBackend::with_path(path)
}

async fn read_state(backend: &LocalBackend) -> Result<StateFile, String> {
    backend
        .read_state()
        .await
        .map(Option::unwrap_or_default)
        .map_err(|e| format!("Failed to read state: {}", e))
}

async fn write_state(backend: &LocalBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend
        .write_state(state)
        .await
        .map_err(|e| format!("Failed to write state: {}", e))
}

async fn lock_state(backend: &LocalBackend, operation: &str) -> Result<LockInfo, String> {
    backend
        .init()
        .await
        .map_err(|e| format!("Failed to prepare state backend: {}", e))?;
    acquire_lock_with_retry(backend, operation, &RetryPolicy::default())
        .await
        .map_err(|e| format!("Failed to acquire state lock: {}", e))
}

/// Release the lock, keeping the first error
async fn unlock_state<T>(
    backend: &LocalBackend,
    lock: &LockInfo,
    result: Result<T, String>,
) -> Result<T, String> {
    let released = backend.release_lock(lock).await;
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(format!("Failed to release state lock {}: {}", lock.id, e)),
        (Err(e), released) => {
            if let Err(release_err) = released {
                warn!("failed to release state lock {}: {}", lock.id, release_err);
            }
            Err(e)
        }
    }
}

/// Fold the outcomes of an applied plan into the state: deletions first,
/// then every state read or written
fn record_outcomes(state: &mut StateFile, result: &ApplyResult, provider: &str) {
    for id in &result.destroyed {
        state.remove_resource(id);
    }
    for outcome in result.outcomes.iter().flatten() {
        match outcome {
            EffectOutcome::Read { state: s }
            | EffectOutcome::Created { state: s }
            | EffectOutcome::Updated { state: s }
            | EffectOutcome::Replaced { state: s } => state.record(s, provider),
            EffectOutcome::Gone { id } | EffectOutcome::Deleted { id } => {
                state.remove_resource(id);
            }
            EffectOutcome::Skipped { .. } => {}
        }
    }
}

fn first_error(result: &ApplyResult) -> Option<String> {
    result
        .outcomes
        .iter()
        .find_map(|o| o.as_ref().err().map(|e| e.to_string()))
}

/// Read back every tracked resource, dropping those that no longer exist
async fn refresh_state(
    interpreter: &Interpreter<Box<dyn Provider>>,
    state: &mut StateFile,
    desired: &[Resource],
) -> Result<Vec<State>, String> {
    let plan = create_refresh_plan(&state.states(), desired);
    let result = interpreter.apply(&plan).await;
    record_outcomes(state, &result, interpreter.provider().name());
    if let Some(e) = first_error(&result) {
        return Err(format!("Failed to refresh state: {}", e));
    }
    Ok(state.states())
}

// =============================================================================
// Commands
// =============================================================================

fn run_validate(config_path: &Path) -> Result<(), String> {
    let config = Config::load(config_path)?;

    println!("{}", "Validating...".cyan());

    let resources = load_desired(&config, &get_schemas())?;

    println!(
        "{}",
        format!("✓ {} resources validated successfully.", resources.len())
            .green()
            .bold()
    );
    for resource in &resources {
        println!("  • {}", resource.id);
    }
    Ok(())
}

async fn run_plan(config_path: &Path, state_path: Option<&Path>) -> Result<(), String> {
    let config = Config::load(config_path)?;
    let schemas = get_schemas();
    let desired = load_desired(&config, &schemas)?;

    let interpreter = get_interpreter(&config).await?;
    let desired: Vec<Resource> = desired
        .into_iter()
        .map(|r| interpreter.provider().normalize_desired(r))
        .collect();

    let backend = get_backend(&config, state_path);
    let mut state = read_state(&backend).await?;
    let current = refresh_state(&interpreter, &mut state, &desired).await?;

    let plan = create_plan(&desired, &current, &schemas).map_err(|e| e.to_string())?;
    print_plan(&plan);
    Ok(())
}

async fn run_apply(config_path: &Path, state_path: Option<&Path>, auto_approve: bool) -> Result<(), String> {
    let config = Config::load(config_path)?;
    let schemas = get_schemas();
    let desired = load_desired(&config, &schemas)?;

    let interpreter = get_interpreter(&config).await?;
    let desired: Vec<Resource> = desired
        .into_iter()
        .map(|r| interpreter.provider().normalize_desired(r))
        .collect();

    let backend = get_backend(&config, state_path);
    let lock = lock_state(&backend, "apply").await?;
    let result = apply_locked(&interpreter, &backend, &desired, &schemas, auto_approve).await;
    unlock_state(&backend, &lock, result).await
}

async fn apply_locked(
    interpreter: &Interpreter<Box<dyn Provider>>,
    backend: &LocalBackend,
    desired: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    let current = refresh_state(interpreter, &mut state, desired).await?;
    let plan = create_plan(desired, &current, schemas).map_err(|e| e.to_string())?;

    if plan.mutation_count() == 0 {
        write_state(backend, &mut state).await?;
        println!("{}", "No changes needed.".green());
        return Ok(());
    }

    print_plan(&plan);
    println!();

    if !auto_approve && !confirm("Do you want to perform these actions?")? {
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let result = interpreter.apply(&plan).await;
    print_outcomes(&result);
    record_outcomes(&mut state, &result, interpreter.provider().name());
    write_state(backend, &mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Apply complete! {} changes applied.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Apply failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_destroy(config_path: &Path, state_path: Option<&Path>, auto_approve: bool) -> Result<(), String> {
    let config = Config::load(config_path)?;
    let desired = config.resources()?;
    let interpreter = get_interpreter(&config).await?;

    let backend = get_backend(&config, state_path);
    let lock = lock_state(&backend, "destroy").await?;
    let result = destroy_locked(&interpreter, &backend, &desired, auto_approve).await;
    unlock_state(&backend, &lock, result).await
}

async fn destroy_locked(
    interpreter: &Interpreter<Box<dyn Provider>>,
    backend: &LocalBackend,
    desired: &[Resource],
    auto_approve: bool,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    let current = refresh_state(interpreter, &mut state, desired).await?;
    let plan = create_destroy_plan(&current, desired);

    if plan.is_empty() {
        write_state(backend, &mut state).await?;
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    println!("{}", "Destroy Plan:".red().bold());
    println!();
    for effect in plan.effects() {
        print_effect(effect);
    }
    println!();
    println!("Plan: {} to destroy.", plan.mutation_count().to_string().red());
    println!();

    if !auto_approve && !confirm("Do you really want to destroy all resources?")? {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let result = interpreter.apply(&plan).await;
    print_outcomes(&result);
    record_outcomes(&mut state, &result, interpreter.provider().name());
    write_state(backend, &mut state).await?;

    println!();
    if result.is_success() {
        println!(
            "{}",
            format!("Destroy complete! {} resources destroyed.", result.success_count)
                .green()
                .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "Destroy failed. {} succeeded, {} failed.",
            result.success_count, result.failure_count
        ))
    }
}

async fn run_refresh(config_path: &Path, state_path: Option<&Path>) -> Result<(), String> {
    let config = Config::load(config_path)?;
    let desired = config.resources()?;
    let interpreter = get_interpreter(&config).await?;
    let backend = get_backend(&config, state_path);

    let lock = lock_state(&backend, "refresh").await?;
    let result = async {
        let mut state = read_state(&backend).await?;
        let before = state.resources.len();
        let current = refresh_state(&interpreter, &mut state, &desired).await?;
        write_state(&backend, &mut state).await?;

        println!(
            "{}",
            format!("✓ Refreshed {} resources.", current.len()).green().bold()
        );
        if before > current.len() {
            println!(
                "  {}",
                format!("{} no longer exist and were removed from state.", before - current.len()).yellow()
            );
        }
        Ok::<(), String>(())
    }
    .await;
    unlock_state(&backend, &lock, result).await
}

async fn run_import(
    config_path: &Path,
    state_path: Option<&Path>,
    address: &str,
    identifier: &str,
) -> Result<(), String> {
    let config = Config::load(config_path)?;
    let id = parse_address(address)?;
    if !get_schemas().contains_key(&id.resource_type) {
        return Err(format!("Unknown resource type '{}'", id.resource_type));
    }

    let interpreter = get_interpreter(&config).await?;
    let backend = get_backend(&config, state_path);

    let lock = lock_state(&backend, "import").await?;
    let result = async {
        let mut state = read_state(&backend).await?;
        if let Some(existing) = state.find_resource(&id) {
            return Err(format!(
                "{} is already managed (identifier: {})",
                id,
                existing.identifier.as_deref().unwrap_or("none")
            ));
        }

        let provider = interpreter.provider();
        let imported = provider
            .import(&id, identifier)
            .await
            .map_err(|e| format!("Import failed: {}", e))?;
        state.record(&imported, provider.name());
        write_state(&backend, &mut state).await?;

        println!(
            "{}",
            format!("✓ Imported {} ({}).", id, identifier).green().bold()
        );
        Ok::<(), String>(())
    }
    .await;
    unlock_state(&backend, &lock, result).await
}

async fn run_state_list(config_path: &Path, state_path: Option<&Path>) -> Result<(), String> {
    let config = load_config_or_default(config_path)?;
    let state = read_state(&get_backend(&config, state_path)).await?;

    for resource in &state.resources {
        match &resource.identifier {
            Some(identifier) => println!("{}  {}", resource.resource_id(), identifier.dimmed()),
            None => println!("{}", resource.resource_id()),
        }
    }
    Ok(())
}

async fn run_state_show(config_path: &Path, state_path: Option<&Path>, address: &str) -> Result<(), String> {
    let config = load_config_or_default(config_path)?;
    let id = parse_address(address)?;
    let state = read_state(&get_backend(&config, state_path)).await?;

    let resource = state
        .find_resource(&id)
        .ok_or_else(|| format!("{} is not in state", id))?;

    println!("{}", format!("# {}", id).bold());
    if let Some(identifier) = &resource.identifier {
        println!("  {} = {}", "id".cyan(), identifier);
    }
    for (key, value) in &resource.attributes {
        println!("  {} = {}", key.cyan(), value);
    }
    Ok(())
}

async fn run_force_unlock(config_path: &Path, state_path: Option<&Path>, lock_id: &str) -> Result<(), String> {
    let config = load_config_or_default(config_path)?;
    get_backend(&config, state_path)
        .force_unlock(lock_id)
        .await
        .map_err(|e| format!("Failed to unlock state: {}", e))?;
    println!("{}", format!("✓ Lock {} released.", lock_id).green().bold());
    Ok(())
}

/// State commands work without a configuration file
fn load_config_or_default(config_path: &Path) -> Result<Config, String> {
    if config_path.exists() {
        Config::load(config_path)
    } else {
        Ok(Config::default())
    }
}

fn parse_address(address: &str) -> Result<ResourceId, String> {
    ResourceId::parse_address(address)
        .ok_or_else(|| format!("Invalid address '{}', expected type.name", address))
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", "Only 'yes' will be accepted to approve.".yellow());
    print!("\n  Enter a value: ");
    std::io::Write::flush(&mut std::io::stdout()).map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();
    Ok(input.trim() == "yes")
}

// =============================================================================
// Output
// =============================================================================

fn print_plan(plan: &Plan) {
    if plan.mutation_count() == 0 {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();
    for effect in plan.effects() {
        print_effect(effect);
    }
    println!();
    println!("{}", plan.summary().to_string().bold());
}

fn print_effect(effect: &Effect) {
    match effect {
        Effect::Read { .. } => {}
        Effect::Create(resource) => {
            println!("  {} {}", "+".green().bold(), resource.id);
            let mut keys: Vec<&String> = resource.attributes.keys().collect();
            keys.sort();
            for key in keys {
                println!("      {}: {}", key, format_value(&resource.attributes[key]));
            }
        }
        Effect::Update {
            id,
            identifier,
            from,
            to,
            changed_attributes,
        } => {
            println!("  {} {} ({})", "~".yellow().bold(), id, identifier.dimmed());
            for key in changed_attributes {
                println!(
                    "      {}: {} → {}",
                    key,
                    format_optional(from.attributes.get(key)),
                    format_optional(to.attributes.get(key))
                );
            }
        }
        Effect::Replace {
            id,
            identifier,
            forced_by,
            ..
        } => {
            println!(
                "  {} {} ({}) {}",
                "-/+".magenta().bold(),
                id,
                identifier.dimmed(),
                format!("forced by: {}", forced_by.join(", ")).magenta()
            );
        }
        Effect::Delete { id, identifier, .. } => {
            println!("  {} {} ({})", "-".red().bold(), id, identifier.dimmed());
        }
    }
}

fn print_outcomes(result: &ApplyResult) {
    for outcome in &result.outcomes {
        match outcome {
            Ok(outcome) => {
                if let Some(line) = format_outcome(outcome) {
                    println!("  {} {}", "✓".green(), line);
                }
            }
            Err(e) => println!("  {} {}", "✗".red(), e),
        }
    }
}

fn format_outcome(outcome: &EffectOutcome) -> Option<String> {
    match outcome {
        EffectOutcome::Created { state } => Some(format!("Create {}", state.id)),
        EffectOutcome::Updated { state } => Some(format!("Update {}", state.id)),
        EffectOutcome::Replaced { state } => Some(format!("Replace {}", state.id)),
        EffectOutcome::Deleted { id } => Some(format!("Delete {}", id)),
        EffectOutcome::Skipped { id, reason } => Some(format!("Skip {} ({})", id, reason)),
        EffectOutcome::Read { .. } | EffectOutcome::Gone { .. } => None,
    }
}

fn format_optional(value: Option<&Value>) -> String {
    value.map(format_value).unwrap_or_else(|| "(none)".dimmed().to_string())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let strs: Vec<_> = entries
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(binding, attr) => format!("{}.{} (known after apply)", binding, attr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::provider::ProviderError;

    fn vpc(name: &str, cidr: &str) -> Resource {
        Resource::new("ec2_vpc", name).with_attribute("cidr_block", Value::String(cidr.to_string()))
    }

    #[test]
    fn validation_reports_every_problem() {
        let resources = vec![
            vpc("main", "10.0.0.0/16"),
            Resource::new("ec2_vpc", "bad").with_attribute("vpc_id", Value::String("vpc-1".to_string())),
            Resource::new("s3_bucket", "logs"),
            Resource::new("ec2_subnet", "a")
                .with_attribute("vpc_id", Value::ResourceRef("missing".to_string(), "id".to_string()))
                .with_attribute("cidr_block", Value::String("10.0.1.0/24".to_string())),
        ];

        let err = validate_resources(&resources, &get_schemas()).unwrap_err();
        assert!(err.contains("ec2_vpc.bad: Required attribute 'cidr_block' is missing"), "{}", err);
        assert!(err.contains("ec2_vpc.bad: Attribute 'vpc_id' is computed"), "{}", err);
        assert!(err.contains("s3_bucket.logs: Unknown resource type 's3_bucket'"), "{}", err);
        assert!(err.contains("refers to unknown resource 'missing'"), "{}", err);

        assert!(validate_resources(&resources[..1], &get_schemas()).is_ok());
    }

    #[test]
    fn defaults_are_filled_in() {
        let mut config = Config::default();
        config.resources = serde_json::from_str(r#"[{ "type": "ec2_eip", "name": "nat" }]"#).unwrap();

        let desired = load_desired(&config, &get_schemas()).unwrap();
        assert_eq!(desired[0].attributes["domain"], Value::String("vpc".to_string()));
    }

    #[test]
    fn outcomes_fold_into_state() {
        let vpc_id = ResourceId::new("ec2_vpc", "main");
        let subnet_id = ResourceId::new("ec2_subnet", "a");
        let rt_id = ResourceId::new("ec2_route_table", "public");

        let mut state = StateFile::new();
        for (id, identifier) in [(&vpc_id, "vpc-old"), (&subnet_id, "subnet-1"), (&rt_id, "rtb-1")] {
            state.record(
                &State::existing(id.clone(), HashMap::new()).with_identifier(identifier),
                "awscc",
            );
        }

        let result = ApplyResult {
            outcomes: vec![
                Ok(EffectOutcome::Replaced {
                    state: State::existing(vpc_id.clone(), HashMap::new()).with_identifier("vpc-new"),
                }),
                Ok(EffectOutcome::Deleted { id: subnet_id.clone() }),
                Err(ProviderError::new("boom")),
            ],
            success_count: 2,
            failure_count: 1,
            destroyed: vec![vpc_id.clone(), subnet_id.clone()],
        };
        record_outcomes(&mut state, &result, "awscc");

        assert_eq!(
            state.find_resource(&vpc_id).and_then(|r| r.identifier.as_deref()),
            Some("vpc-new")
        );
        assert!(state.find_resource(&subnet_id).is_none());
        assert!(state.find_resource(&rt_id).is_some());
        assert_eq!(first_error(&result).as_deref(), Some("boom"));
    }

    #[test]
    fn replaced_resource_whose_create_failed_leaves_state() {
        let id = ResourceId::new("ec2_vpc", "main");
        let mut state = StateFile::new();
        state.record(&State::existing(id.clone(), HashMap::new()).with_identifier("vpc-1"), "awscc");

        let result = ApplyResult {
            outcomes: vec![Err(ProviderError::new("create failed"))],
            success_count: 0,
            failure_count: 1,
            destroyed: vec![id.clone()],
        };
        record_outcomes(&mut state, &result, "awscc");
        assert!(state.resources.is_empty());
    }

    #[test]
    fn address_parsing() {
        assert_eq!(parse_address("ec2_vpc.main").unwrap(), ResourceId::new("ec2_vpc", "main"));
        assert!(parse_address("main").is_err());
    }

    #[test]
    fn values_render_for_plans() {
        let map: HashMap<String, Value> = [
            ("b".to_string(), Value::Int(2)),
            ("a".to_string(), Value::Bool(true)),
        ]
        .into_iter()
        .collect();
        assert_eq!(format_value(&Value::Map(map)), "{a: true, b: 2}");
        assert_eq!(
            format_value(&Value::ResourceRef("main".to_string(), "id".to_string())),
            "main.id (known after apply)"
        );
        assert_eq!(
            format_value(&Value::List(vec![Value::String("x".to_string())])),
            "[\"x\"]"
        );
    }
}
