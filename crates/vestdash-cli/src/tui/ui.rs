//! TUI rendering using ratatui.

use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use vestdash_core::model::{ReleasePlan, now_epoch_secs};
use vestdash_core::session::NoticeLevel;

use super::app::{App, View};
use crate::display;

/// Render the current view.
pub fn render(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // account header
            Constraint::Min(3),    // main content
            Constraint::Length(1), // status bar
        ])
        .split(f.area());

    render_header(f, app, chunks[0]);
    match app.current_view {
        View::Plans => render_plans(f, app, chunks[1]),
        View::Help => render_help(f, chunks[1]),
    }
    render_status_bar(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let lines = match app.view.account {
        Some(account) => {
            let claimable = &app.view.claimable_total;
            let claim_hint = if claimable.is_zero() {
                Span::raw("")
            } else {
                Span::styled("  [A] Claim All", Style::default().fg(Color::Green))
            };
            vec![
                Line::from(vec![
                    Span::styled("Account:   ", Style::default().fg(Color::Yellow)),
                    Span::raw(account.short()),
                ]),
                Line::from(vec![
                    Span::styled("Claimable: ", Style::default().fg(Color::Yellow)),
                    Span::styled(
                        app.display.amount(*claimable),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    claim_hint,
                ]),
            ]
        }
        None => vec![Line::from(Span::styled(
            "Not connected. Press c to connect a wallet.",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let header = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Token Release Dashboard "),
    );
    f.render_widget(header, area);
}

fn render_plans(f: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(format!(
        " Release Plans ({}) ",
        app.view.plans.len()
    ));

    if app.view.is_connected() && app.view.plans.is_empty() {
        let empty = Paragraph::new("No release plans found")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let header_cells = [
        "Index",
        "Start Time",
        "Amount",
        "Delay Compensation",
        "Status",
        "Action",
    ]
    .iter()
    .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow)));
    let header = Row::new(header_cells).height(1);

    let now = now_epoch_secs();
    let rows = app.view.plans.iter().enumerate().map(|(i, plan)| {
        let style = if i == app.selected {
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let action = if plan.is_claimable_at(now) {
            Span::styled("[enter] Claim", Style::default().fg(Color::Cyan))
        } else {
            Span::raw("")
        };

        Row::new(vec![
            Cell::from(plan.index.to_string()),
            Cell::from(display::start_time(plan)),
            Cell::from(app.display.units(plan.amount)),
            Cell::from(app.display.units(plan.delay_compensation_amount)),
            Cell::from(status_colored(plan)),
            Cell::from(action),
        ])
        .style(style)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(20),
            Constraint::Percentage(20),
            Constraint::Percentage(20),
            Constraint::Length(8),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(block);

    f.render_widget(table, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let section = |title: &'static str| {
        Line::from(Span::styled(
            title,
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
    };
    let text = vec![
        Line::from(""),
        section("  Navigation"),
        Line::from("    j/Down    Move down"),
        Line::from("    k/Up      Move up"),
        Line::from("    Esc/q     Back / Quit"),
        Line::from(""),
        section("  Wallet"),
        Line::from("    c         Connect"),
        Line::from("    s         Switch to next account"),
        Line::from("    d         Disconnect"),
        Line::from("    r         Reload plans"),
        Line::from(""),
        section("  Claims"),
        Line::from("    Enter     Claim selected plan (if started)"),
        Line::from("    A         Claim all (if anything is claimable)"),
        Line::from(""),
        section("  Other"),
        Line::from("    ?         Show this help"),
        Line::from(""),
    ];

    let help = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title(" Help "));
    f.render_widget(help, area);
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let view_name = match app.current_view {
        View::Plans => "Plans",
        View::Help => "Help",
    };

    let (message, color) = match &app.status {
        Some(notice) => {
            let color = match notice.level {
                NoticeLevel::Info => Color::Cyan,
                NoticeLevel::Success => Color::Green,
                NoticeLevel::Error => Color::Red,
            };
            (notice.message.as_str(), color)
        }
        None => ("", Color::Reset),
    };

    let bar = Line::from(vec![
        Span::styled(
            format!(" {view_name} "),
            Style::default().bg(Color::Blue).fg(Color::White),
        ),
        Span::raw("  "),
        Span::styled(message, Style::default().fg(color)),
        Span::raw("  q:quit  ?:help"),
    ]);

    f.render_widget(Paragraph::new(bar), area);
}

// -- Helpers --

fn status_colored(plan: &ReleasePlan) -> Span<'static> {
    let color = if plan.claimed {
        Color::Green
    } else {
        Color::Yellow
    };
    Span::styled(display::status_label(plan), Style::default().fg(color))
}
