//! Interactive TUI dashboard for inspecting and claiming release plans.

pub mod app;
mod ui;

use std::io;
use std::sync::Arc;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use app::{App, SessionLink};

use crate::context::AppContext;

/// Launch the interactive TUI dashboard.
pub async fn run_dashboard(ctx: AppContext) -> Result<()> {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    let runner = {
        let session = Arc::clone(&ctx.session);
        let cancel = cancel.clone();
        tokio::spawn(async move { session.run(event_rx, command_rx, cancel).await })
    };

    let link = SessionLink {
        view: ctx.session.subscribe(),
        notices: ctx.notices,
        commands: command_tx,
        events: event_tx,
    };
    let mut app = App::new(link, ctx.accounts, ctx.display);

    // Set up terminal.
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, &mut app);

    // Restore terminal.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    cancel.cancel();
    if let Err(err) = runner.await {
        tracing::warn!(error = %err, "session task ended abnormally");
    }

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let tick_rate = app.tick_rate;

    loop {
        app.sync();
        terminal.draw(|f| ui::render(f, app))?;

        // Poll for events with a timeout matching the tick rate.
        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.navigate_back(),
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        app.should_quit = true;
                    }
                    KeyCode::Char('c') => app.connect(),
                    KeyCode::Char('j') | KeyCode::Down => app.move_down(),
                    KeyCode::Char('k') | KeyCode::Up => app.move_up(),
                    KeyCode::Enter => app.claim_selected(),
                    KeyCode::Char('A') => app.claim_all(),
                    KeyCode::Char('s') => app.switch_account(),
                    KeyCode::Char('d') => app.disconnect(),
                    KeyCode::Char('r') => app.refresh(),
                    KeyCode::Char('?') => app.show_help(),
                    _ => {}
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
