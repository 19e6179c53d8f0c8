//! Command dispatch: turns parsed arguments into service calls

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use clap::CommandFactory;
use serde::Serialize;
use termtree::Tree;
use tracing::{debug, instrument};

use crate::cli::args::{Cli, Commands, ConfigCommands, CreateArgs};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{NewNode, Node, NodeAttributes, NodeId};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    let Some(command) = &cli.command else {
        return Err(CliError::Usage(
            "no command given, run with --help for usage".to_string(),
        ));
    };

    match command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(*shell, &mut cmd, name, &mut io::stdout());
            return Ok(());
        }
        Commands::Config { command } => return cmd_config(cli, command),
        _ => {}
    }

    let settings = load_settings(cli)?;
    let container = ServiceContainer::new(settings)?;

    match command {
        Commands::Create(args) => cmd_create(&container, cli, args),
        Commands::Show { id } => {
            let node = container.tree.get_node(NodeId(*id))?;
            print_node(&container, cli, &node)
        }
        Commands::Children { id } => {
            let children = container.tree.get_children(NodeId(*id))?;
            print_nodes(&container, cli, &children)
        }
        Commands::Move { id, parent } => {
            let node = container.tree.change_parent(NodeId(*id), NodeId(*parent))?;
            if cli.json {
                print_json(&container, &node)
            } else {
                output::success(&format!("moved {}", output::node_line(&node)));
                Ok(())
            }
        }
        Commands::Ancestors { id } => {
            let chain = container.tree.ancestors(NodeId(*id))?;
            print_nodes(&container, cli, &chain)
        }
        Commands::Tree { id } => cmd_tree(&container, cli, id.map(NodeId)),
        Commands::Repair => {
            let fixed = container.tree.repair_heights()?;
            output::action("Repaired", &format!("{fixed} heights"));
            Ok(())
        }
        Commands::Config { .. } | Commands::Completion { .. } => Ok(()),
    }
}

fn current_dir() -> CliResult<PathBuf> {
    std::env::current_dir().map_err(|e| InfraError::io("determine current directory", e).into())
}

/// Layered settings plus command line overrides.
fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let cwd = current_dir()?;
    let mut settings = Settings::load(Some(cwd.as_path()))?;
    if let Some(store) = &cli.store {
        settings.store_path = store.clone();
    }
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    debug!("settings: {:?}", settings);
    Ok(settings)
}

/// `true`/`false` become booleans; anything else is passed on for the policy to reject.
fn parse_active(raw: &str) -> serde_json::Value {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => serde_json::Value::Bool(true),
        "false" => serde_json::Value::Bool(false),
        _ => serde_json::Value::String(raw.to_string()),
    }
}

fn new_node_from_args(args: &CreateArgs) -> NewNode {
    NewNode {
        name: args.name.clone(),
        kind: args.kind,
        parent_id: args.parent.map(NodeId),
        attributes: NodeAttributes {
            zip_code: args.zip_code.clone(),
            monthly_rent: args.monthly_rent,
            active: args.active.as_deref().map(parse_active),
            moved_in_date: args.moved_in_date,
        },
    }
}

#[instrument(skip(container, cli))]
fn cmd_create(container: &ServiceContainer, cli: &Cli, args: &CreateArgs) -> CliResult<()> {
    let node = container.tree.create_node(new_node_from_args(args))?;
    if cli.json {
        print_json(container, &node)
    } else {
        output::success(&format!("created {}", output::node_line(&node)));
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(container: &ServiceContainer, value: &T) -> CliResult<()> {
    let text = if container.settings.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    output::info(&text);
    Ok(())
}

fn print_node(container: &ServiceContainer, cli: &Cli, node: &Node) -> CliResult<()> {
    if cli.json {
        return print_json(container, node);
    }
    output::info(&output::node_line(node));
    Ok(())
}

fn print_nodes(container: &ServiceContainer, cli: &Cli, nodes: &[Node]) -> CliResult<()> {
    if cli.json {
        return print_json(container, nodes);
    }
    for node in nodes {
        output::info(&output::node_line(node));
    }
    Ok(())
}

#[instrument(skip(container, cli))]
fn cmd_tree(container: &ServiceContainer, cli: &Cli, root: Option<NodeId>) -> CliResult<()> {
    let roots = match root {
        Some(id) => vec![container.tree.get_node(id)?],
        None => container.tree.roots()?,
    };

    let mut subtrees = Vec::with_capacity(roots.len());
    for r in &roots {
        subtrees.push(container.tree.subtree(r.id)?);
    }

    if cli.json {
        let flat: Vec<&Node> = subtrees.iter().flatten().collect();
        return print_json(container, &flat);
    }

    if subtrees.is_empty() {
        output::detail(&"(empty)");
    }
    for nodes in &subtrees {
        if let Some(tree) = render_tree(nodes) {
            output::info(&tree);
        }
    }
    Ok(())
}

/// Build a termtree from a breadth-first node listing whose first entry is the root.
pub fn render_tree(nodes: &[Node]) -> Option<Tree<String>> {
    let root = nodes.first()?;
    let mut children: HashMap<NodeId, Vec<&Node>> = HashMap::new();
    for node in &nodes[1..] {
        if let Some(parent) = node.parent_id {
            children.entry(parent).or_default().push(node);
        }
    }

    fn build(node: &Node, children: &HashMap<NodeId, Vec<&Node>>) -> Tree<String> {
        let leaves = children
            .get(&node.id)
            .into_iter()
            .flatten()
            .map(|child| build(child, children));
        Tree::new(output::node_line(node)).with_leaves(leaves)
    }

    Some(build(root, &children))
}

fn cmd_config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let cwd = current_dir()?;
            match global_config_path() {
                Some(p) => output::action("global", &p.display()),
                None => output::action("global", &"(no config directory)"),
            }
            output::action("local", &local_config_path(&cwd).display());
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("cannot determine global config directory".to_string())
                })?
            } else {
                local_config_path(&current_dir()?)
            };
            if path.exists() {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::header(&"Config created");
            output::detail(&path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NodePayload;

    #[test]
    fn given_active_text_when_parsing_then_only_true_false_become_booleans() {
        assert_eq!(parse_active("TRUE"), serde_json::Value::Bool(true));
        assert_eq!(parse_active("false"), serde_json::Value::Bool(false));
        assert_eq!(
            parse_active("yes"),
            serde_json::Value::String("yes".to_string())
        );
    }

    #[test]
    fn given_subtree_listing_when_rendering_then_children_are_nested() {
        colored::control::set_override(false);
        let corp = Node {
            id: NodeId(1),
            name: "Acme".into(),
            parent_id: None,
            height: 0,
            payload: NodePayload::Corporation,
        };
        let tower = Node {
            id: NodeId(2),
            name: "Tower".into(),
            parent_id: Some(NodeId(1)),
            height: 1,
            payload: NodePayload::Building {
                zip_code: "12345".into(),
            },
        };

        let tree = render_tree(&[corp, tower]).unwrap().to_string();

        let lines: Vec<&str> = tree.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Acme"));
        assert!(lines[1].contains("Tower") && lines[1].contains("zip_code=12345"));
        assert!(lines[1].starts_with("└"));
    }
}
