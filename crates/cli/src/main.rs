use clap::{Parser, Subcommand};
use dxg_core::{
    catalog, config, validation, CoreConfig, DefaultSessionStore, Group, GroupId, GroupingResult,
    SaveHint, SaveOutcome, SaveQueue, SessionState, Workspace,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "dxg")]
#[command(about = "Diagnosis grouping workspace CLI")]
struct Cli {
    /// Base URL of the presigned-URL broker (local-only when unset)
    #[arg(long, env = "DXG_BROKER_URL", global = true)]
    broker: Option<String>,
    /// Local cache directory
    #[arg(long, env = "DXG_CACHE_DIR", global = true)]
    cache_dir: Option<String>,
    /// Diagnosis catalog file or URL
    #[arg(long, env = "DXG_CATALOG", global = true)]
    catalog: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the suggestion groups of a catalog
    Catalog {
        /// Catalog file path or http(s) URL
        source: String,
    },
    /// Print a user's stored grouping tree
    Show {
        #[arg(long)]
        user: String,
    },
    /// Edit a user's session with commands read from stdin
    Session {
        #[arg(long)]
        user: String,
    },
    /// Clear a user's stored session
    Reset {
        #[arg(long)]
        user: String,
    },
    /// Print the most recently used user id
    LastUser,
}

const SESSION_HELP: &str = "\
commands:
  move <diagnosis-id> <group-id>
  group <name> = <diagnosis-id>...
  empty <name>
  sub <parent-group-id> <name>
  order <parent-group-id> <child-group-id>...
  toggle <group-id>
  delete <group-id>
  accept [name]
  dismiss | undo | save | show | summary | help | quit";

#[derive(Debug, PartialEq)]
enum Action {
    Move {
        diagnosis_id: String,
        target: GroupId,
    },
    Group {
        name: String,
        diagnosis_ids: Vec<String>,
    },
    Empty(String),
    Sub {
        parent: GroupId,
        name: String,
    },
    Order {
        parent: GroupId,
        children: Vec<GroupId>,
    },
    Toggle(GroupId),
    Delete(GroupId),
    Accept(Option<String>),
    Dismiss,
    Undo,
    Save,
    Show,
    Summary,
    Help,
    Quit,
}

fn group_id(raw: Option<&str>) -> Result<GroupId, String> {
    let raw = raw.ok_or("missing group id")?;
    GroupId::parse(raw).map_err(|e| e.to_string())
}

/// Parses one line of the session loop. Blank lines and `#` comments yield `None`.
fn parse_action(line: &str) -> Result<Option<Action>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (command, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut words = rest.split_whitespace();

    let action = match command {
        "move" => {
            let diagnosis_id = words.next().ok_or("missing diagnosis id")?.to_string();
            Action::Move {
                diagnosis_id,
                target: group_id(words.next())?,
            }
        }
        "group" => {
            let (name, ids) = rest.split_once('=').ok_or("expected: group <name> = <ids>")?;
            Action::Group {
                name: name.trim().to_string(),
                diagnosis_ids: ids.split_whitespace().map(str::to_string).collect(),
            }
        }
        "empty" => Action::Empty(rest.to_string()),
        "sub" => {
            let parent = group_id(words.next())?;
            Action::Sub {
                parent,
                name: words.collect::<Vec<_>>().join(" "),
            }
        }
        "order" => {
            let parent = group_id(words.next())?;
            let children = words
                .map(|w| group_id(Some(w)))
                .collect::<Result<Vec<_>, _>>()?;
            Action::Order { parent, children }
        }
        "toggle" => Action::Toggle(group_id(words.next())?),
        "delete" => Action::Delete(group_id(words.next())?),
        "accept" => Action::Accept(Some(rest.to_string()).filter(|n| !n.is_empty())),
        "dismiss" => Action::Dismiss,
        "undo" => Action::Undo,
        "save" => Action::Save,
        "show" => Action::Show,
        "summary" => Action::Summary,
        "help" => Action::Help,
        "quit" | "exit" => Action::Quit,
        other => return Err(format!("unknown command '{}'; try 'help'", other)),
    };

    Ok(Some(action))
}

/// Runs a mutating action. Returns the save hint and an optional note for the user.
fn apply(workspace: &mut Workspace, action: Action) -> GroupingResult<(SaveHint, Option<String>)> {
    let hint = match action {
        Action::Move {
            diagnosis_id,
            target,
        } => workspace.move_diagnosis(&diagnosis_id, &target)?,
        Action::Group {
            name,
            diagnosis_ids,
        } => workspace.create_or_merge_group(&name, &diagnosis_ids)?,
        Action::Empty(name) => workspace.create_empty_group(&name)?,
        Action::Sub { parent, name } => {
            let (id, hint) = workspace.add_subgroup(&parent, &name)?;
            return Ok((hint, Some(format!("added subgroup {}", id))));
        }
        Action::Order { parent, children } => workspace.reorder_subgroups(&parent, &children)?,
        Action::Toggle(id) => workspace.toggle_collapse(&id)?,
        Action::Delete(id) => workspace.delete_group(&id)?,
        Action::Accept(name) => workspace.accept_current_suggestion(name.as_deref())?,
        Action::Dismiss => workspace.dismiss_current_suggestion()?,
        Action::Undo => match workspace.undo() {
            Some(hint) => hint,
            None => return Ok((SaveHint::None, Some("nothing to undo".into()))),
        },
        Action::Save => workspace.mark_saved(),
        Action::Show | Action::Summary | Action::Help | Action::Quit => SaveHint::None,
    };
    Ok((hint, None))
}

fn render_group(group: &Group, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let marker = if group.collapsed { "+" } else { "-" };
    let _ = writeln!(out, "{}{} {} [{}]", indent, marker, group.name, group.id);
    if group.collapsed {
        return;
    }
    for diagnosis in &group.diagnoses {
        let _ = writeln!(out, "{}    {}  {}", indent, diagnosis.id, diagnosis.name);
    }
    for subgroup in &group.subgroups {
        render_group(subgroup, depth + 1, out);
    }
}

fn render_state(state: &SessionState) -> String {
    let mut out = String::new();
    if state.confirmed_groups.is_empty() {
        out.push_str("(no groups)\n");
    }
    for group in &state.confirmed_groups {
        render_group(group, 0, &mut out);
    }
    if !state.unsorted_diagnoses.is_empty() {
        out.push_str("unsorted:\n");
        for diagnosis in &state.unsorted_diagnoses {
            let _ = writeln!(out, "    {}  {}", diagnosis.id, diagnosis.name);
        }
    }
    out
}

fn render_workspace(workspace: &Workspace) -> String {
    let mut out = render_state(workspace.state());
    let suggestions = workspace.suggestions();
    match suggestions.current() {
        Some(current) => {
            let _ = writeln!(
                out,
                "suggestion {}/{}: {}",
                suggestions.current_index() + 1,
                suggestions.suggested_groups().len(),
                current.name
            );
            for diagnosis in &current.diagnoses {
                let _ = writeln!(out, "    {}  {}", diagnosis.id, diagnosis.name);
            }
        }
        None => out.push_str("all suggestions processed\n"),
    }
    out
}

fn report_save(outcome: &SaveOutcome) {
    match outcome.warning() {
        Some(warning) => eprintln!("warning: {}", warning),
        None => println!("saved"),
    }
}

fn core_config(cli: &Cli) -> anyhow::Result<CoreConfig> {
    Ok(CoreConfig::new(
        config::broker_url_from_env_value(cli.broker.clone())?,
        config::cache_dir_from_env_value(cli.cache_dir.clone()),
        config::catalog_source_from_env_value(cli.catalog.clone()),
        config::save_debounce_from_env_value(std::env::var("DXG_SAVE_DEBOUNCE_MS").ok())?,
        config::undo_capacity_from_env_value(std::env::var("DXG_UNDO_CAPACITY").ok())?,
    )?)
}

async fn run_session(cfg: &CoreConfig, user: &str) -> anyhow::Result<()> {
    let user_id = validation::validate_user_id(user)?.to_string();
    let store = Arc::new(DefaultSessionStore::from_config(cfg)?);
    let suggestions = match cfg.catalog_source() {
        Some(source) => catalog::load_catalog(source).await?,
        None => Vec::new(),
    };

    let loaded = store.load(&user_id).await;
    if let Some(warning) = &loaded.warning {
        eprintln!("warning: {}", warning);
    }
    if let Err(e) = store.remember_user_id(&user_id) {
        tracing::warn!("Failed to remember user id: {}", e);
    }

    let mut workspace = Workspace::new(
        user_id.clone(),
        loaded.state,
        suggestions,
        cfg.undo_capacity(),
    );
    let saves = SaveQueue::spawn(store, user_id, cfg.save_debounce());
    print!("{}", render_workspace(&workspace));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let action = match parse_action(&line) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match action {
            Action::Quit => break,
            Action::Help => println!("{}", SESSION_HELP),
            Action::Show => print!("{}", render_workspace(&workspace)),
            Action::Summary => {
                let summary = workspace.summary();
                println!(
                    "groups: {} (+{} subgroups), confirmed diagnoses: {}, unsorted: {}, \
                     suggestions remaining: {}, complete: {}",
                    summary.group_count,
                    summary.subgroup_count,
                    summary.confirmed_diagnosis_count,
                    summary.unsorted_count,
                    summary.suggestions_remaining,
                    summary.complete
                );
            }
            action => match apply(&mut workspace, action) {
                Ok((hint, note)) => {
                    if let Some(note) = note {
                        println!("{}", note);
                    }
                    if let Some(outcome) = saves.apply(hint, workspace.state()).await {
                        report_save(&outcome);
                    }
                    if hint != SaveHint::None {
                        print!("{}", render_workspace(&workspace));
                    }
                }
                Err(e) => eprintln!("Error: {}", e),
            },
        }
    }

    saves.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("dxg=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = core_config(&cli)?;

    match cli.command {
        Some(Commands::Catalog { source }) => match catalog::load_catalog(&source).await {
            Ok(groups) => {
                for group in groups {
                    println!("{} ({} diagnoses)", group.name, group.diagnoses.len());
                    for diagnosis in group.diagnoses {
                        println!("    {}  {}", diagnosis.id, diagnosis.name);
                    }
                }
            }
            Err(e) => eprintln!("Error loading catalog: {}", e),
        },
        Some(Commands::Show { user }) => {
            let user_id = validation::validate_user_id(&user)?;
            let store = DefaultSessionStore::from_config(&cfg)?;
            let loaded = store.load(user_id).await;
            if let Some(warning) = &loaded.warning {
                eprintln!("warning: {}", warning);
            }
            println!("source: {:?}", loaded.source);
            print!("{}", render_state(&loaded.state));
        }
        Some(Commands::Session { user }) => run_session(&cfg, &user).await?,
        Some(Commands::Reset { user }) => {
            let user_id = validation::validate_user_id(&user)?;
            let store = DefaultSessionStore::from_config(&cfg)?;
            let outcome = store.clear(user_id).await;
            match outcome.warning() {
                Some(warning) => eprintln!("Cleared {} with warning: {}", user_id, warning),
                None => println!("Cleared stored session for {}", user_id),
            }
        }
        Some(Commands::LastUser) => {
            let store = DefaultSessionStore::from_config(&cfg)?;
            match store.last_user_id()? {
                Some(user_id) => println!("{}", user_id),
                None => println!("No user has opened a session yet."),
            }
        }
        None => {
            println!("Use 'dxg --help' for commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxg_core::{Diagnosis, NonEmptyText};

    fn gid(id: &str) -> GroupId {
        GroupId::parse(id).unwrap()
    }

    #[test]
    fn test_parse_skips_blank_and_comment_lines() {
        assert_eq!(parse_action("   ").unwrap(), None);
        assert_eq!(parse_action("# note").unwrap(), None);
    }

    #[test]
    fn test_parse_group_takes_multi_word_name() {
        let action = parse_action("group Heart failure = I50 I11").unwrap();
        assert_eq!(
            action,
            Some(Action::Group {
                name: "Heart failure".into(),
                diagnosis_ids: vec!["I50".into(), "I11".into()],
            })
        );
        assert!(parse_action("group Heart failure").is_err());
    }

    #[test]
    fn test_parse_structural_commands() {
        assert_eq!(
            parse_action("move E11 g1").unwrap(),
            Some(Action::Move {
                diagnosis_id: "E11".into(),
                target: gid("g1"),
            })
        );
        assert_eq!(
            parse_action("sub g1 Diabetic eye disease").unwrap(),
            Some(Action::Sub {
                parent: gid("g1"),
                name: "Diabetic eye disease".into(),
            })
        );
        assert_eq!(
            parse_action("order g1 c2 c1").unwrap(),
            Some(Action::Order {
                parent: gid("g1"),
                children: vec![gid("c2"), gid("c1")],
            })
        );
        assert_eq!(parse_action("accept").unwrap(), Some(Action::Accept(None)));
        assert_eq!(
            parse_action("accept Metabolic").unwrap(),
            Some(Action::Accept(Some("Metabolic".into())))
        );
        assert!(parse_action("move E11").is_err());
        assert!(parse_action("frobnicate").is_err());
    }

    #[test]
    fn test_apply_reports_empty_undo() {
        let mut workspace = Workspace::new("u1", SessionState::default(), Vec::new(), 5);
        let (hint, note) = apply(&mut workspace, Action::Undo).unwrap();
        assert_eq!(hint, SaveHint::None);
        assert_eq!(note.as_deref(), Some("nothing to undo"));
    }

    #[test]
    fn test_apply_rejects_empty_group_name() {
        let mut workspace = Workspace::new("u1", SessionState::default(), Vec::new(), 5);
        assert!(apply(&mut workspace, Action::Empty("  ".into())).is_err());
        assert!(workspace.state().confirmed_groups.is_empty());
    }

    #[test]
    fn test_render_state_hides_collapsed_contents() {
        let name = NonEmptyText::new("Eye").unwrap();
        let mut group = Group::with_diagnoses(&name, vec![Diagnosis::new("H40", "Glaucoma")]);
        let state = SessionState {
            confirmed_groups: vec![Arc::new(group.clone())],
            unsorted_diagnoses: vec![Diagnosis::new("E11", "Type 2 diabetes")],
        };
        let rendered = render_state(&state);
        assert!(rendered.contains("- Eye"));
        assert!(rendered.contains("H40  Glaucoma"));
        assert!(rendered.contains("unsorted:"));

        group.collapsed = true;
        let collapsed = SessionState {
            confirmed_groups: vec![Arc::new(group)],
            unsorted_diagnoses: Vec::new(),
        };
        let rendered = render_state(&collapsed);
        assert!(rendered.contains("+ Eye"));
        assert!(!rendered.contains("Glaucoma"));
    }
}
