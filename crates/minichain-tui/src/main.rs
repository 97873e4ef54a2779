//! Terminal UI host for the minichain ledger.
//!
//! Owns an in-memory chain, collects transfer records from the user, mines
//! new blocks on a background worker so the UI stays responsive, and
//! renders the ledger as a table with a block inspector and a validate
//! action.
use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event as CEvent, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use minichain_core::{
    chain::Chain,
    constants::{MAX_DIFFICULTY, MIN_DIFFICULTY},
    mine::{spawn_mine, MineJob, MineOutcome},
    Block as LedgerBlock, Record,
};
use ratatui::{
    layout::{Constraint, Direction, Flex, Layout, Rect},
    prelude::*,
    widgets::*,
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Creator id stamped on blocks added through this host.
const HOST_CREATOR_ID: u64 = 42;

#[derive(Parser, Debug, Clone)]
#[command(name = "minichain-tui")]
#[command(about = "Interactive host for the minichain ledger")]
struct Args {
    /// Initial proof-of-work difficulty (leading zero hex chars, 1-5)
    #[arg(short, long, default_value_t = 2)]
    difficulty: u32,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    #[default]
    Ledger,
    Add,
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    #[default]
    Sender,
    Receiver,
    Amount,
}

#[derive(Debug)]
struct App {
    chain: Chain,
    tab: Tab,
    // ledger table
    cursor: usize,
    table_state: TableState,
    popup: bool,
    valid_status: Option<String>,
    // add form
    field: Field,
    sender: String,
    receiver: String,
    amount: String,
    add_status: Option<String>,
    // in-flight search
    job: Option<MineJob>,
}

impl App {
    fn new(args: &Args) -> Self {
        let difficulty = args.difficulty.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
        Self {
            chain: Chain::with_difficulty(difficulty),
            tab: Tab::default(),
            cursor: 0,
            table_state: TableState::default(),
            popup: false,
            valid_status: None,
            field: Field::default(),
            sender: String::new(),
            receiver: String::new(),
            amount: String::new(),
            add_status: None,
            job: None,
        }
    }

    fn mining(&self) -> bool {
        self.job.is_some()
    }

    fn next_row(&mut self) {
        if self.chain.is_empty() {
            return;
        }
        self.cursor = (self.cursor + 1) % self.chain.len();
        self.table_state.select(Some(self.cursor));
    }

    fn previous_row(&mut self) {
        if self.chain.is_empty() {
            return;
        }
        self.cursor = self.cursor.checked_sub(1).unwrap_or(self.chain.len() - 1);
        self.table_state.select(Some(self.cursor));
    }

    fn raise_difficulty(&mut self) {
        if self.mining() {
            self.add_status = Some("difficulty is locked while a search is running".into());
            return;
        }
        if self.chain.difficulty < MAX_DIFFICULTY {
            self.chain.difficulty += 1;
        }
    }

    fn lower_difficulty(&mut self) {
        if self.mining() {
            self.add_status = Some("difficulty is locked while a search is running".into());
            return;
        }
        if self.chain.difficulty > MIN_DIFFICULTY {
            self.chain.difficulty -= 1;
        }
    }

    fn validate(&mut self) {
        self.valid_status = Some(if self.chain.is_valid() {
            "chain is VALID".to_string()
        } else {
            "chain is INVALID".to_string()
        });
    }

    /// Build a candidate against the current tip and start the background
    /// nonce search.
    fn submit(&mut self) {
        if self.mining() {
            self.add_status = Some("a search is already running".into());
            return;
        }
        if self.sender.is_empty() || self.receiver.is_empty() {
            self.add_status = Some("sender and receiver are required".into());
            return;
        }
        let amount: u64 = match self.amount.parse() {
            Ok(v) => v,
            Err(_) => {
                self.add_status = Some(format!("amount {:?} is not a whole number", self.amount));
                return;
            }
        };
        let record = Record::new(self.sender.clone(), self.receiver.clone(), amount);
        let prev_hash = match self.chain.tip() {
            Ok(tip) => tip.hash(),
            Err(e) => {
                self.add_status = Some(e.to_string());
                return;
            }
        };
        let candidate = LedgerBlock::new(record, HOST_CREATOR_ID, prev_hash);
        self.job = Some(spawn_mine(candidate, self.chain.difficulty));
        self.add_status = Some(format!(
            "searching at difficulty {}...",
            self.chain.difficulty
        ));
    }

    /// Poll the in-flight search; on success admit the mined block.
    fn poll_job(&mut self) {
        let Some(job) = self.job.as_mut() else {
            return;
        };
        let Some(outcome) = job.try_finish() else {
            return;
        };
        self.job = None;
        match outcome {
            MineOutcome::Mined(block, hash) => match self.chain.admit(block) {
                Ok(()) => {
                    info!(index = self.chain.len() - 1, hash = %hash, "block admitted");
                    self.add_status = Some(format!(
                        "block {} admitted, hash {hash}",
                        self.chain.len() - 1
                    ));
                    self.sender.clear();
                    self.receiver.clear();
                    self.amount.clear();
                    self.valid_status = None;
                }
                Err(e) => self.add_status = Some(format!("admission failed: {e}")),
            },
            MineOutcome::Cancelled(block) => {
                self.add_status = Some(format!(
                    "search cancelled after nonce {}",
                    block.nonce
                ));
            }
        }
    }

    fn cancel_job(&mut self) {
        if let Some(job) = &self.job {
            job.cancel();
        }
    }

    fn field_value(&mut self) -> &mut String {
        match self.field {
            Field::Sender => &mut self.sender,
            Field::Receiver => &mut self.receiver,
            Field::Amount => &mut self.amount,
        }
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(&args);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    loop {
        app.poll_job();
        terminal.draw(|f| ui(f, app))?;

        if crossterm::event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if handle_key(app, key) {
                    app.cancel_job();
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns true when the app should quit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Char('c') if ctrl => return true,
        KeyCode::Char('q') if app.tab == Tab::Ledger => return true,
        KeyCode::Esc => {
            if app.mining() {
                app.cancel_job();
            } else {
                return true;
            }
        }
        KeyCode::Tab | KeyCode::BackTab => {
            app.tab = match app.tab {
                Tab::Ledger => Tab::Add,
                Tab::Add => Tab::Ledger,
            };
        }
        KeyCode::Char('+') => app.raise_difficulty(),
        KeyCode::Char('-') => app.lower_difficulty(),
        KeyCode::Char('v') if app.tab == Tab::Ledger => app.validate(),
        KeyCode::Char('p') if app.tab == Tab::Ledger => app.popup = !app.popup,
        KeyCode::Down => match app.tab {
            Tab::Ledger => app.next_row(),
            Tab::Add => {
                app.field = match app.field {
                    Field::Sender => Field::Receiver,
                    Field::Receiver => Field::Amount,
                    Field::Amount => Field::Sender,
                }
            }
        },
        KeyCode::Up => match app.tab {
            Tab::Ledger => app.previous_row(),
            Tab::Add => {
                app.field = match app.field {
                    Field::Sender => Field::Amount,
                    Field::Receiver => Field::Sender,
                    Field::Amount => Field::Receiver,
                }
            }
        },
        _ => {
            if app.tab == Tab::Add {
                match key.code {
                    KeyCode::Char(c) if !c.is_control() => app.field_value().push(c),
                    KeyCode::Backspace => {
                        app.field_value().pop();
                    }
                    KeyCode::Enter => app.submit(),
                    _ => {}
                }
            }
        }
    }
    false
}

fn ui(f: &mut Frame, app: &mut App) {
    let size = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);

    let titles = ["Ledger", "Add block"]
        .iter()
        .map(|t| Line::from(*t))
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .select(app.tab as usize)
        .block(
            Block::default().borders(Borders::ALL).title(format!(
                "minichain-tui — difficulty {} (+/- to adjust)",
                app.chain.difficulty
            )),
        )
        .style(Style::default().fg(Color::Green))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match app.tab {
        Tab::Ledger => render_ledger(f, chunks[1], app),
        Tab::Add => render_add(f, chunks[1], app),
    }

    let help = Paragraph::new(
        "q/ESC quit • TAB switch • +/- difficulty • Ledger: ↑/↓ select, p inspect, v validate • Add: ↑/↓ field, Enter mine, ESC cancel search",
    )
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default().borders(Borders::ALL).title("help"));
    f.render_widget(help, chunks[2]);
}

fn render_ledger(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(area);

    let rows = app.chain.blocks.iter().enumerate().map(|(i, b)| {
        Row::new(vec![
            Cell::from(i.to_string()),
            Cell::from(b.record.sender.clone()),
            Cell::from(b.record.receiver.clone()),
            Cell::from(b.record.amount.to_string()),
            Cell::from(b.creator_id.to_string()),
            Cell::from(b.timestamp.clone()),
            Cell::from(b.nonce.to_string()),
            Cell::from(b.prev_hash.clone()),
            Cell::from(b.hash()),
        ])
        .style(if i == app.cursor {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        })
    });
    let table = Table::new(
        rows,
        vec![
            Constraint::Length(4),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(9),
            Constraint::Length(8),
            Constraint::Length(66),
            Constraint::Length(66),
        ],
    )
    .header(
        Row::new(vec![
            "idx", "sender", "receiver", "amount", "creator", "ts", "nonce", "prev", "hash",
        ])
        .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("The ledger"));
    f.render_stateful_widget(table, chunks[0], &mut app.table_state);

    let status = Paragraph::new(app.valid_status.clone().unwrap_or_default())
        .block(Block::default().borders(Borders::ALL).title("Validation"));
    f.render_widget(status, chunks[1]);

    if app.popup {
        let popup = Block::bordered()
            .style(Style::default().bg(Color::Black).fg(Color::Yellow))
            .title("Block inspector")
            .title_style(Style::new().yellow().bold())
            .border_style(Style::new().red().bold());
        let items = if app.cursor >= app.chain.len() {
            vec!["No block selected".to_string()]
        } else {
            let b = &app.chain.blocks[app.cursor];
            vec![
                format!(" Index     : {}", app.cursor),
                format!(" Sender    : {}", b.record.sender),
                format!(" Receiver  : {}", b.record.receiver),
                format!(" Amount    : {}", b.record.amount),
                format!(" Creator   : {}", b.creator_id),
                format!(" Timestamp : {}", b.timestamp),
                format!(" Nonce     : {}", b.nonce),
                format!(" Prev hash : {}", b.prev_hash),
                format!(" Hash      : {}", b.hash()),
            ]
        };
        let list = List::new(items).block(popup.clone());
        let popup_area = centered_area(area, 70, 40);
        f.render_widget(Clear, popup_area);
        f.render_widget(popup, popup_area);
        f.render_widget(list, popup_area);
    }
}

fn render_add(f: &mut Frame, area: Rect, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);

    let marker = |field: Field| if app.field == field { ">" } else { " " };
    let form = Paragraph::new(vec![
        Line::from(format!("{} Sender   : {}", marker(Field::Sender), app.sender)),
        Line::from(format!(
            "{} Receiver : {}",
            marker(Field::Receiver),
            app.receiver
        )),
        Line::from(format!("{} Amount   : {}", marker(Field::Amount), app.amount)),
        Line::from("Press <Enter> to mine and add the block"),
    ])
    .block(Block::default().title("New record").borders(Borders::ALL));
    f.render_widget(form, chunks[0]);

    let progress = if let Some(job) = &app.job {
        format!("mining... {} nonces tried", job.attempts())
    } else {
        String::new()
    };
    let search = Paragraph::new(progress)
        .block(Block::default().borders(Borders::ALL).title("Search"));
    f.render_widget(search, chunks[1]);

    let status = Paragraph::new(app.add_status.clone().unwrap_or_default())
        .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(status, chunks[2]);
}

/// Create a centered rect using the given percentage of the available rect
fn centered_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
    let [area] = vertical.areas(area);

    let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
    let [area] = horizontal.areas(area);

    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent {
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn test_app() -> App {
        App::new(&Args { difficulty: 1 })
    }

    #[test]
    fn tab_transitions_via_handle_key() {
        let mut app = test_app();
        assert_eq!(app.tab, Tab::Ledger);
        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.tab, Tab::Add);
        handle_key(&mut app, key(KeyCode::Tab));
        assert_eq!(app.tab, Tab::Ledger);
    }

    #[test]
    fn difficulty_keys_stay_in_range() {
        let mut app = test_app();
        for _ in 0..10 {
            handle_key(&mut app, key(KeyCode::Char('-')));
        }
        assert_eq!(app.chain.difficulty, MIN_DIFFICULTY);
        for _ in 0..10 {
            handle_key(&mut app, key(KeyCode::Char('+')));
        }
        assert_eq!(app.chain.difficulty, MAX_DIFFICULTY);
    }

    #[test]
    fn submit_mines_and_admits_a_block() {
        let mut app = test_app();
        app.sender = "A".into();
        app.receiver = "B".into();
        app.amount = "10".into();
        app.submit();
        assert!(app.mining());
        while app.mining() {
            app.poll_job();
        }
        assert_eq!(app.chain.len(), 2);
        assert!(app.chain.is_valid());
        assert_eq!(app.chain.blocks[1].creator_id, HOST_CREATOR_ID);
    }

    #[test]
    fn submit_rejects_bad_amount() {
        let mut app = test_app();
        app.sender = "A".into();
        app.receiver = "B".into();
        app.amount = "ten".into();
        app.submit();
        assert!(!app.mining());
        assert_eq!(app.chain.len(), 1);
    }

    #[test]
    fn validate_reports_tampering() {
        let mut app = test_app();
        app.chain
            .add_block(Record::new("A", "B", 10), HOST_CREATOR_ID)
            .unwrap();
        app.validate();
        assert_eq!(app.valid_status.as_deref(), Some("chain is VALID"));

        app.chain.blocks[1].record.amount = 999;
        app.validate();
        assert_eq!(app.valid_status.as_deref(), Some("chain is INVALID"));
    }
}
