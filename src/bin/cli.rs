//! Administrative CLI for the `cyphercore` query engine.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cyphercore::ast::{AggregateFn, CompareOp, Direction, QueryAst};
use cyphercore::builder::QueryBuilder;
use cyphercore::{Engine, EngineConfig};

#[derive(Parser, Debug)]
#[command(
    name = "cyphercore",
    version,
    about = "Administrative CLI for the cyphercore embeddable query engine",
    disable_help_subcommand = true
)]
struct Cli {
    /// Path to a TOML config file overriding `EngineConfig` defaults.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format for query/explain/profile replies.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Graph lifecycle: create, delete, seed-demo.
    Graph {
        #[command(subcommand)]
        action: GraphAction,
    },
    /// Runs a read-only query and prints its result rows.
    Query {
        graph: String,
        #[arg(long, value_name = "JSON|@FILE")]
        ast: String,
    },
    /// Compiles a query and prints its plan tree without executing it.
    Explain {
        graph: String,
        #[arg(long, value_name = "JSON|@FILE")]
        ast: String,
    },
    /// Executes a query and prints per-operator timings instead of rows.
    Profile {
        graph: String,
        #[arg(long, value_name = "JSON|@FILE")]
        ast: String,
    },
    /// Schema introspection procedures.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    /// Persists or restores a graph as JSON.
    Snapshot {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand, Debug)]
enum GraphAction {
    /// Registers a new, empty graph.
    Create { name: String },
    /// Drops a graph and all of its data.
    Delete { name: String },
    /// Populates `name` with the Alice/Bob/Carol/Acme demo dataset used by
    /// this crate's own integration tests, for trying the CLI by hand.
    SeedDemo { name: String },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Labels { graph: String },
    PropertyKeys { graph: String },
    RelationshipTypes { graph: String },
}

#[derive(Subcommand, Debug)]
enum SnapshotAction {
    Save { graph: String, path: PathBuf },
    Load { graph: String, path: PathBuf },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_toml(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    let engine = Engine::new(config);

    match cli.command {
        Command::Graph { action } => run_graph(&engine, action)?,
        Command::Query { graph, ast } => {
            let ast = load_ast(&ast)?;
            let reply = engine.query(&graph, &ast, cyphercore::ReplyFormat::Verbose)?;
            print_reply(&cli.format, &engine, &graph, &reply)?;
        }
        Command::Explain { graph, ast } => {
            let ast = load_ast(&ast)?;
            let explain = engine.explain(&graph, &ast)?;
            println!("{}", explain.root.render());
        }
        Command::Profile { graph, ast } => {
            let ast = load_ast(&ast)?;
            let report = engine.profile(&graph, &ast)?;
            println!(
                "rows_produced: {}\ntotal_elapsed: {:.3}ms\n{}",
                report.rows_produced,
                report.total_elapsed.as_secs_f64() * 1000.0,
                report.tree
            );
        }
        Command::Db { action } => run_db(&engine, &cli.format, action)?,
        Command::Snapshot { action } => run_snapshot(&engine, action)?,
    }

    Ok(())
}

fn run_graph(engine: &Engine, action: GraphAction) -> Result<(), Box<dyn Error>> {
    match action {
        GraphAction::Create { name } => {
            if engine.create_graph(&name) {
                println!("created graph '{name}'");
            } else {
                return Err(format!("graph '{name}' already exists").into());
            }
        }
        GraphAction::Delete { name } => {
            engine.delete_graph(&name)?;
            println!("deleted graph '{name}'");
        }
        GraphAction::SeedDemo { name } => {
            engine.create_graph(&name);
            seed_demo_graph(engine, &name)?;
            println!("seeded demo data into '{name}'");
        }
    }
    Ok(())
}

fn run_db(engine: &Engine, format: &OutputFormat, action: DbAction) -> Result<(), Box<dyn Error>> {
    let (title, names) = match action {
        DbAction::Labels { graph } => ("labels", engine.labels(&graph)?),
        DbAction::PropertyKeys { graph } => ("propertyKeys", engine.property_keys(&graph)?),
        DbAction::RelationshipTypes { graph } => {
            ("relationshipTypes", engine.relationship_types(&graph)?)
        }
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&names)?),
        OutputFormat::Text => {
            println!("{title}:");
            for name in names {
                println!("  {name}");
            }
        }
    }
    Ok(())
}

fn run_snapshot(engine: &Engine, action: SnapshotAction) -> Result<(), Box<dyn Error>> {
    match action {
        SnapshotAction::Save { graph, path } => {
            engine.save_snapshot(&graph, &path)?;
            println!("saved '{graph}' to {}", path.display());
        }
        SnapshotAction::Load { graph, path } => {
            engine.load_snapshot(&graph, &path)?;
            println!("loaded '{graph}' from {}", path.display());
        }
    }
    Ok(())
}

fn print_reply(
    format: &OutputFormat,
    engine: &Engine,
    graph_name: &str,
    reply: &cyphercore::CommandReply,
) -> Result<(), Box<dyn Error>> {
    let handle = engine
        .catalog()
        .get(graph_name)
        .ok_or_else(|| format!("no such graph '{graph_name}'"))?;
    let graph = handle.read();
    match format {
        OutputFormat::Json => println!("{}", reply.render_compact(&graph)),
        OutputFormat::Text => print!("{}", reply.render_verbose(&graph)),
    }
    Ok(())
}

/// Parses `--ast`: either an inline JSON-encoded [`QueryAst`] or, prefixed
/// with `@`, a path to a file containing one. There is no textual query
/// language front-end in this crate (see [`cyphercore::builder`]), so the
/// CLI's query input is the AST's own JSON serialization.
fn load_ast(spec: &str) -> Result<QueryAst, Box<dyn Error>> {
    let text = match spec.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)?,
        None => spec.to_owned(),
    };
    Ok(serde_json::from_str(&text)?)
}

/// Builds the Alice/Bob/Carol/Acme dataset: three `Person` nodes connected
/// by `KNOWS` edges plus a `Company` node Alice `WORKS_AT`.
fn seed_demo_graph(engine: &Engine, graph_name: &str) -> Result<(), Box<dyn Error>> {
    use cyphercore::value::Value;
    engine.mutate(graph_name, |graph| {
        let alice = graph.add_node(
            &["Person"],
            vec![("name", Value::string("Alice")), ("age", Value::Int(30))],
        );
        let bob = graph.add_node(
            &["Person"],
            vec![("name", Value::string("Bob")), ("age", Value::Int(25))],
        );
        let carol = graph.add_node(
            &["Person"],
            vec![("name", Value::string("Carol")), ("age", Value::Int(40))],
        );
        let acme = graph.add_node(&["Company"], vec![("name", Value::string("Acme"))]);
        graph.add_edge(alice, bob, "KNOWS", vec![])?;
        graph.add_edge(bob, carol, "KNOWS", vec![])?;
        graph.add_edge(alice, acme, "WORKS_AT", vec![])?;
        Ok(())
    })?;
    Ok(())
}

/// Builds the `MATCH (p:Person) RETURN p.name ORDER BY p.name` AST used by
/// the `--example` convenience below, so a first-time user can see a
/// complete JSON AST without hand-writing one.
#[allow(dead_code)]
fn example_ast() -> QueryAst {
    QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .compare("p", "age", CompareOp::Gt, 20i64)
        .edge(Direction::Out, Some("KNOWS"))
        .node("q", Some("Person"))
        .r#return_prop("p", "name", None)
        .r#return_prop("q", "name", Some("knows"))
        .distinct()
        .order_by("p", Some("name"), false)
        .build()
}

#[allow(dead_code)]
fn example_aggregate_ast() -> QueryAst {
    QueryBuilder::new()
        .r#match()
        .node("p", Some("Person"))
        .r#return_agg(AggregateFn::Count, "p", None, "person_count")
        .build()
}
