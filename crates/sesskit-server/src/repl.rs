//! Interactive REPL over a file-backed session.
//!
//! Launch with `sesskit-server repl`. Type `/help` for available commands,
//! Tab for completion.

use std::borrow::Cow;

use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Config, Editor, Helper};
use serde_json::Value;

use sesskit::{FileBackend, Flash, Session};

use crate::config::SessionConfig;
use crate::types::format_time;

/// Available REPL commands.
const COMMANDS: &[(&str, &str)] = &[
    ("/new", "Start a fresh session"),
    ("/open", "Resume a stored session by id"),
    ("/list", "List stored session ids"),
    ("/id", "Show the current session id and timestamps"),
    ("/regenerate", "Rotate the session id"),
    ("/set", "Set a key: /set <key> <json>"),
    ("/get", "Get a key: /get <key> [inner]"),
    ("/pull", "Get and remove a key"),
    ("/exists", "Check whether a key is set"),
    ("/flash", "Store a flash: /flash <name> <text|json>"),
    ("/message", "Render and consume a flash (default: success)"),
    ("/display", "Show the whole store"),
    ("/destroy", "/destroy (all) | /destroy <key> | /destroy --prefix"),
    ("/save", "Write the session to disk"),
    ("/gc", "Remove expired session files"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit the REPL"),
];

/// Completes command names, and stored ids after `/open`.
///
/// Hints are dimmed and accepted with the right arrow.
struct SessionHelper {
    ids: Vec<String>,
}

impl SessionHelper {
    fn ids_starting_with<'a>(&'a self, partial: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.ids.iter().filter(move |id| id.starts_with(partial))
    }

    /// Replacement start and candidates for the text before the cursor.
    fn candidates(&self, input: &str) -> (usize, Vec<Pair>) {
        match input.split_once(' ') {
            None => {
                let pairs = COMMANDS
                    .iter()
                    .filter(|(cmd, _)| cmd.starts_with(input))
                    .map(|(cmd, desc)| Pair {
                        display: format!("{cmd:<12} {desc}"),
                        replacement: format!("{cmd} "),
                    })
                    .collect();
                (0, pairs)
            }
            Some(("/open", rest)) => {
                let partial = rest.trim_start();
                let pairs = self
                    .ids_starting_with(partial)
                    .map(|id| Pair {
                        display: id.clone(),
                        replacement: id.clone(),
                    })
                    .collect();
                (input.len() - partial.len(), pairs)
            }
            Some(_) => (input.len(), Vec::new()),
        }
    }

    /// Rest of the only command or id that `line` can still become.
    fn hint_for(&self, line: &str) -> Option<String> {
        match line.split_once(' ') {
            None if line.starts_with('/') => COMMANDS
                .iter()
                .find_map(|(cmd, _)| cmd.strip_prefix(line).filter(|rest| !rest.is_empty()))
                .map(str::to_string),
            Some(("/open", partial)) if !partial.is_empty() => {
                let mut ids = self.ids_starting_with(partial);
                match (ids.next(), ids.next()) {
                    (Some(id), None) => Some(id[partial.len()..].to_string()),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl Completer for SessionHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(self.candidates(&line[..pos]))
    }
}

impl Hinter for SessionHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        (pos == line.len()).then(|| self.hint_for(line)).flatten()
    }
}

impl Highlighter for SessionHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        Cow::Owned(format!("\x1b[90m{hint}\x1b[0m"))
    }
}

impl Validator for SessionHelper {}
impl Helper for SessionHelper {}

/// REPL state: the resolved config and the open session.
pub struct ReplState {
    config: SessionConfig,
    session: Session<FileBackend>,
}

impl ReplState {
    pub fn new(config: SessionConfig) -> Self {
        let session = Session::start(config.open_backend(None), config.prefix.clone());
        Self { config, session }
    }

    pub fn session(&self) -> &Session<FileBackend> {
        &self.session
    }

    fn stored_ids(&self) -> Vec<String> {
        self.session.backend().stored_ids().unwrap_or_default()
    }

    /// Run one command line. Returns `false` when the REPL should exit.
    pub fn execute(&mut self, line: &str) -> bool {
        let input = line.strip_prefix('/').unwrap_or(line);
        if input.is_empty() {
            cmd_help();
            return true;
        }

        let (cmd, args) = input.split_once(' ').unwrap_or((input, ""));
        let args = args.trim();

        match cmd {
            "exit" | "quit" => {
                self.save();
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                return false;
            }
            "help" | "h" | "?" => cmd_help(),
            "clear" | "cls" => eprint!("\x1b[2J\x1b[H"),
            "new" => self.cmd_new(),
            "open" => self.cmd_open(args),
            "list" => self.cmd_list(),
            "id" => self.cmd_id(),
            "regenerate" => self.cmd_regenerate(),
            "set" => self.cmd_set(args),
            "get" => self.cmd_get(args),
            "pull" => self.cmd_pull(args),
            "exists" => self.cmd_exists(args),
            "flash" => self.cmd_flash(args),
            "message" => self.cmd_message(args),
            "display" => self.cmd_display(),
            "destroy" => self.cmd_destroy(args),
            "save" => self.save(),
            "gc" => self.cmd_gc(),
            _ => {
                eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
            }
        }
        true
    }

    fn replace_session(&mut self, backend: FileBackend) {
        self.save();
        self.session = Session::start(backend, self.config.prefix.clone());
    }

    fn save(&mut self) {
        if let Err(e) = self.session.save() {
            eprintln!("  Failed to save session: {e}");
        }
    }

    fn cmd_new(&mut self) {
        self.replace_session(self.config.open_backend(None));
        eprintln!("  New session: {}", self.session.id().unwrap_or("-"));
    }

    fn cmd_open(&mut self, args: &str) {
        let Some(id) = args.split_whitespace().next() else {
            eprintln!("  Usage: /open <id>");
            return;
        };
        self.replace_session(self.config.open_backend(Some(id)));
        match self.session.id() {
            Some(current) if current == id => {
                eprintln!("  Opened {id} ({} keys)", self.session.display().len());
            }
            Some(current) => eprintln!("  No stored session {id}; started {current}"),
            None => eprintln!("  Session could not be started"),
        }
    }

    fn cmd_list(&self) {
        let ids = self.stored_ids();
        eprintln!();
        let dir = self.session.backend().save_dir();
        eprintln!("  {} stored sessions in {}", ids.len(), dir.display());
        for id in ids {
            let marker = if Some(id.as_str()) == self.session.id() { "*" } else { " " };
            eprintln!("   {marker} {id}");
        }
        eprintln!();
    }

    fn cmd_id(&self) {
        let Some(id) = self.session.id() else {
            eprintln!("  (no session)");
            return;
        };
        let backend = self.session.backend();
        eprintln!("  {id}");
        eprintln!("    created  {}", format_time(backend.created_at()));
        if backend.is_persisted() {
            eprintln!("    updated  {}", format_time(backend.updated_at()));
        } else {
            eprintln!("    (not saved yet)");
        }
    }

    fn cmd_gc(&mut self) {
        self.save();
        match self.session.backend().gc(self.config.max_lifetime) {
            Ok(removed) => eprintln!(
                "  Removed {removed} session(s) idle longer than {}s",
                self.config.max_lifetime.as_secs()
            ),
            Err(e) => eprintln!("  Gc failed: {e}"),
        }
    }

    fn cmd_regenerate(&mut self) {
        match self.session.regenerate() {
            Ok(id) => eprintln!("  New id: {id}"),
            Err(e) => eprintln!("  Cannot regenerate: {e}"),
        }
    }

    fn cmd_set(&mut self, args: &str) {
        let Some((key, raw)) = args.split_once(' ') else {
            eprintln!("  Usage: /set <key> <json>");
            return;
        };
        self.session.set(key, parse_value(raw.trim()));
    }

    fn cmd_get(&self, args: &str) {
        let mut parts = args.split_whitespace();
        let Some(key) = parts.next() else {
            eprintln!("  Usage: /get <key> [inner]");
            return;
        };
        print_value(self.session.get(key, parts.next()));
    }

    fn cmd_pull(&mut self, args: &str) {
        if args.is_empty() {
            eprintln!("  Usage: /pull <key>");
            return;
        }
        print_value(self.session.pull(args).as_ref());
    }

    fn cmd_exists(&self, args: &str) {
        if args.is_empty() {
            eprintln!("  Usage: /exists <key>");
            return;
        }
        eprintln!("  {}", self.session.exists(args));
    }

    fn cmd_flash(&mut self, args: &str) {
        let Some((name, raw)) = args.split_once(' ') else {
            eprintln!("  Usage: /flash <name> <text|{{\"type\":..,\"text\":..}}>");
            return;
        };
        let raw = raw.trim();
        let flash = serde_json::from_str::<Flash>(raw).unwrap_or_else(|_| Flash::plain(raw));
        self.session.flash(name, flash);
    }

    fn cmd_message(&mut self, args: &str) {
        let rendered = if args.is_empty() {
            self.session.message_default()
        } else {
            self.session.message(args)
        };
        match rendered {
            Some(html) => println!("{html}"),
            None => eprintln!("  (no message)"),
        }
    }

    fn cmd_display(&self) {
        let store = Value::Object(self.session.display().clone());
        println!(
            "{}",
            serde_json::to_string_pretty(&store).unwrap_or_default()
        );
    }

    fn cmd_destroy(&mut self, args: &str) {
        let result = match args {
            "" => self.session.destroy_session(),
            "--prefix" => self.session.clear_prefixed(),
            key => self.session.forget(key),
        };
        if let Err(e) = result {
            eprintln!("  Destroy failed: {e}");
        } else if !self.session.is_started() {
            eprintln!("  Session destroyed. Use /new to start another.");
        }
    }
}

/// Parse a REPL argument as JSON, falling back to a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_value(value: Option<&Value>) {
    match value {
        Some(v) => println!("{}", serde_json::to_string_pretty(v).unwrap_or_default()),
        None => eprintln!("  (null)"),
    }
}

/// Run the interactive REPL.
pub fn run(config: SessionConfig) -> anyhow::Result<()> {
    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1msesskit v{}\x1b[0m \x1b[90m\u{2014} prefixed sessions\x1b[0m",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();
    eprintln!(
        "    Press \x1b[36m/\x1b[0m to browse commands, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .completion_prompt_limit(20)
        .build();

    let mut rl: Editor<SessionHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(rl_config)?;

    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    let hist_path = std::path::PathBuf::from(&home).join(".sesskit_history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let mut state = ReplState::new(config);
    eprintln!(
        "  Session {} (prefix '{}')",
        state.session().id().unwrap_or("-"),
        state.session().prefix()
    );
    let prompt = " \x1b[36msession>\x1b[0m ";

    loop {
        rl.set_helper(Some(SessionHelper {
            ids: state.stored_ids(),
        }));

        match rl.readline(prompt) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !state.execute(line) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => {
                state.save();
                eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    let _ = std::fs::create_dir_all(hist_path.parent().unwrap_or(std::path::Path::new(".")));
    let _ = rl.save_history(&hist_path);

    Ok(())
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<18} {desc}");
    }
    eprintln!();
    eprintln!("  Values are parsed as JSON when possible, otherwise stored as text.");
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(dir: &tempfile::TempDir) -> ReplState {
        ReplState::new(SessionConfig::resolve(
            Some("repl_"),
            dir.path().to_str(),
            None,
        ))
    }

    #[test]
    fn test_set_and_get_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        assert!(state.execute("/set count 3"));
        assert!(state.execute("/set name ada lovelace"));
        assert_eq!(state.session().get("count", None), Some(&json!(3)));
        assert_eq!(state.session().get("name", None), Some(&json!("ada lovelace")));
    }

    #[test]
    fn test_flash_and_message_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        state.execute(r#"/flash success {"type":"info","text":"Hi"}"#);
        assert_eq!(
            state.session().get("success", None),
            Some(&json!({"type": "info", "text": "Hi"}))
        );
        state.execute("/message");
        assert!(!state.session().exists("success"));
    }

    #[test]
    fn test_open_resumes_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        state.execute("/set k 1");
        state.execute("/save");
        let id = state.session().id().unwrap().to_string();

        state.execute("/new");
        assert_ne!(state.session().id(), Some(id.as_str()));

        state.execute(&format!("/open {id}"));
        assert_eq!(state.session().id(), Some(id.as_str()));
        assert_eq!(state.session().get("k", None), Some(&json!(1)));
    }

    #[test]
    fn test_destroy_command_modes() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        state.execute("/set a 1");
        state.execute("/set b 2");
        state.execute("/destroy a");
        assert!(!state.session().exists("a"));
        assert!(state.session().exists("b"));

        state.execute("/destroy --prefix");
        assert!(!state.session().exists("b"));
        assert!(state.session().is_started());

        state.execute("/destroy");
        assert!(!state.session().is_started());
    }

    #[test]
    fn test_exit_returns_false() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        assert!(!state.execute("/exit"));
    }

    #[test]
    fn test_completion_and_hints() {
        let helper = SessionHelper {
            ids: vec!["abc123".to_string(), "abd456".to_string(), "ff0000".to_string()],
        };

        let (start, pairs) = helper.candidates("/re");
        assert_eq!(start, 0);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].replacement, "/regenerate ");

        let (start, pairs) = helper.candidates("/open ab");
        assert_eq!(start, "/open ".len());
        assert_eq!(pairs.len(), 2);
        assert!(helper.candidates("/set ab").1.is_empty());

        assert_eq!(helper.hint_for("/disp").as_deref(), Some("lay"));
        assert_eq!(helper.hint_for("/exit"), None);
        assert_eq!(helper.hint_for("/open ff").as_deref(), Some("0000"));
        assert_eq!(helper.hint_for("/open ab"), None);
    }

    #[test]
    fn test_gc_command_keeps_current_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = ReplState::new(
            SessionConfig::resolve(Some("repl_"), dir.path().to_str(), None).with_max_lifetime(Some(0)),
        );
        state.execute("/set k 1");
        state.execute("/gc");
        let id = state.session().id().unwrap().to_string();
        assert!(state.session().backend().is_persisted());
        assert_eq!(state.session().backend().stored_ids().unwrap(), vec![id]);
    }

    #[test]
    fn test_id_and_list_commands_read_backend() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(&dir);
        assert!(state.execute("/id"));
        state.execute("/set k 1");
        state.execute("/save");
        assert!(state.execute("/id"));
        assert!(state.execute("/list"));

        let backend = state.session().backend();
        assert_eq!(backend.save_dir(), dir.path());
        assert!(backend.created_at() <= backend.updated_at());
    }
}
