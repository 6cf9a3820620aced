use crate::client::{
    AppSnapshot,
    short_key,
};
use chrono::TimeDelta;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEvent,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use itertools::Itertools;
use rand::Rng;
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        canvas::{
            Canvas,
            Line as CanvasLine,
        },
        *,
    },
};
use std::io::stdout;
use tokio::sync::mpsc;
use unicode_width::{
    UnicodeWidthChar,
    UnicodeWidthStr,
};
use wheel::{
    INDICATOR_ANGLE,
    Participant,
    Segment,
    SpinPhase,
    SpinSnapshot,
    segments::FULL_TURN,
    total_deposits,
};

const NAME_COLUMN_WIDTH: usize = 10;
const MAX_NAME_CHARS: usize = 32;
const CONFETTI_PIECES: usize = 40;

/// Title and body of each introduction step.
const INTRO_STEPS: [(&str, &str); 3] = [
    (
        "Welcome to The Next Rich!",
        "Discover how to play and buy tokens on pump.fun. Start by connecting your wallet and exploring our features.",
    ),
    (
        "How to Play",
        "Participate by depositing tokens. Each deposit increases your chances of winning in the roulette!",
    ),
    (
        "Let's Get Started!",
        "Buy tokens on pump.fun, then press d to make your first deposit.",
    ),
];

#[derive(Clone, Debug, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Refresh,
    DismissErrors,
    IntroFinished,
    ConfirmDeposit { name: String, amount: String },
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

#[derive(Debug)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    last_name: String,
    confetti: Vec<(f64, f64, Color)>,
}

impl UiState {
    pub fn new(show_intro: bool) -> Self {
        UiState {
            mode: if show_intro {
                Mode::IntroModal { step: 0 }
            } else {
                Mode::Normal
            },
            terminal: None,
            last_name: String::new(),
            confetti: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
enum Mode {
    #[default]
    Normal,
    DepositModal(DepositForm),
    IntroModal {
        step: usize,
    },
    QuitModal,
}

#[derive(Clone, Debug, Default, PartialEq)]
struct DepositForm {
    name: String,
    amount: String,
    focus: DepositField,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum DepositField {
    #[default]
    Name,
    Amount,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

/// Reads terminal events on a dedicated thread so the async loop never
/// blocks on input.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let ev = event::read();
            let failed = ev.is_err();
            if tx.send(ev).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(rx: &mut InputEventReceiver) -> Result<Event> {
    match rx.recv().await {
        Some(ev) => Ok(ev?),
        None => Err(eyre!("terminal input stream closed")),
    }
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if snap.wheel.phase == SpinPhase::Revealed {
        if state.confetti.is_empty() {
            state.confetti = scatter_confetti(&mut rand::rng(), CONFETTI_PIECES);
        }
    } else {
        state.confetti.clear();
    }
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, state, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    match event {
        Event::Resize(..) => Some(UserEvent::Redraw),
        Event::Key(k) if k.kind == KeyEventKind::Press => handle_key(state, k),
        _ => None,
    }
}

fn handle_key(state: &mut UiState, k: KeyEvent) -> Option<UserEvent> {
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    match &mut state.mode {
        Mode::IntroModal { step } => match k.code {
            KeyCode::Enter | KeyCode::Right | KeyCode::Char(' ') => {
                if *step + 1 < INTRO_STEPS.len() {
                    *step += 1;
                    Some(UserEvent::Redraw)
                } else {
                    state.mode = Mode::Normal;
                    Some(UserEvent::IntroFinished)
                }
            }
            KeyCode::Left | KeyCode::Backspace => {
                *step = step.saturating_sub(1);
                Some(UserEvent::Redraw)
            }
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::IntroFinished)
            }
            _ => None,
        },
        Mode::DepositModal(form) => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
                form.focus = match form.focus {
                    DepositField::Name => DepositField::Amount,
                    DepositField::Amount => DepositField::Name,
                };
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter if form.focus == DepositField::Name => {
                form.focus = DepositField::Amount;
                Some(UserEvent::Redraw)
            }
            KeyCode::Enter => {
                let form = std::mem::take(form);
                state.last_name = form.name.trim().to_string();
                state.mode = Mode::Normal;
                Some(UserEvent::ConfirmDeposit {
                    name: form.name,
                    amount: form.amount,
                })
            }
            KeyCode::Backspace => {
                match form.focus {
                    DepositField::Name => form.name.pop(),
                    DepositField::Amount => form.amount.pop(),
                };
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c) => {
                match form.focus {
                    DepositField::Name
                        if !c.is_control() && form.name.chars().count() < MAX_NAME_CHARS =>
                    {
                        form.name.push(c)
                    }
                    DepositField::Amount if c.is_ascii_digit() || c == '.' => form.amount.push(c),
                    _ => return None,
                }
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('d') => {
                state.mode = Mode::DepositModal(DepositForm {
                    focus: if state.last_name.is_empty() {
                        DepositField::Name
                    } else {
                        DepositField::Amount
                    },
                    name: state.last_name.clone(),
                    amount: String::new(),
                });
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('i') | KeyCode::Char('?') => {
                state.mode = Mode::IntroModal { step: 0 };
                Some(UserEvent::Redraw)
            }
            KeyCode::Char('r') => Some(UserEvent::Refresh),
            KeyCode::Char('c') => Some(UserEvent::DismissErrors),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // wallet + round header
            Constraint::Min(12),   // wheel + tables
            Constraint::Length(7), // status/errors + help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);
    draw_wheel(f, middle[0], snap);
    let tables = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(middle[1]);
    draw_leaderboard(f, tables[0], &snap.wheel);
    draw_last_winners(f, tables[1], snap);
    draw_bottom(f, chunks[2], snap);
    draw_celebration(f, state, snap);
    draw_modals(f, state, snap);
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wallet = snap
        .wallet
        .as_deref()
        .map(short_key)
        .unwrap_or_else(|| String::from("not connected"));
    let source = if snap.simulated { "Simulated" } else { "Live" };
    let round = snap
        .wheel
        .round_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| String::from("none"));
    let countdown = match (snap.wheel.phase, snap.wheel.countdown) {
        (SpinPhase::Spinning, _) => String::from("spinning"),
        (SpinPhase::Revealed, _) => String::from("winner!"),
        (_, Some(left)) => format_countdown(left),
        (_, None) => String::from("--"),
    };
    let deposits = if snap.deposit_in_flight {
        "awaiting wallet"
    } else if snap.wheel.deposits_open {
        "open"
    } else {
        "closed"
    };
    let stale = if snap.stale { " | data may be stale" } else { "" };
    let text = format!(
        "Wallet: {wallet} | {source} round {round} | Time left: {countdown} | Prize pool: {} | Deposits: {deposits}{stale}",
        format_tokens(snap.wheel.prize_amount)
    );
    let widget = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("The Next Rich"));
    f.render_widget(widget, area);
}

fn draw_wheel(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let wheel = &snap.wheel;
    let under = segment_under_indicator(&wheel.segments, wheel.rotation);
    let title = match under {
        Some(segment) if wheel.phase != SpinPhase::Idle => {
            format!("Roulette | ▶ {}", truncate_to_width(&segment.owner, NAME_COLUMN_WIDTH))
        }
        _ => String::from("Roulette"),
    };
    let count = wheel.segments.len();
    let rotation = wheel.rotation;
    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(Marker::Braille)
        .x_bounds([-1.2, 1.2])
        .y_bounds([-1.2, 1.2])
        .paint(move |ctx| {
            if count == 0 {
                ctx.print(-0.45, 0.0, "No deposits yet");
                return;
            }
            for (i, segment) in wheel.segments.iter().enumerate() {
                let color = segment_color(i, count);
                let mut angle = segment.start_angle;
                while angle < segment.end_angle() {
                    let (x, y) = polar(angle + rotation, 1.0);
                    ctx.draw(&CanvasLine {
                        x1: 0.0,
                        y1: 0.0,
                        x2: x,
                        y2: y,
                        color,
                    });
                    angle += 1.5;
                }
            }
            let (x1, y1) = polar(INDICATOR_ANGLE, 1.05);
            let (x2, y2) = polar(INDICATOR_ANGLE, 1.2);
            ctx.draw(&CanvasLine {
                x1,
                y1,
                x2,
                y2,
                color: Color::White,
            });
        });
    f.render_widget(canvas, area);
}

fn draw_leaderboard(f: &mut Frame, area: Rect, wheel: &SpinSnapshot) {
    let rows = leaderboard_rows(&wheel.participants)
        .into_iter()
        .map(|(name, deposit, chance)| {
            Row::new(vec![
                Cell::from(name),
                Cell::from(format_tokens(deposit)),
                Cell::from(format!("{chance:.1}%")),
            ])
        })
        .collect::<Vec<_>>();
    let table = Table::new(
        rows,
        [
            Constraint::Length(NAME_COLUMN_WIDTH as u16 + 2),
            Constraint::Min(12),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec!["Player", "Deposit", "Chance"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("Current Deposits"));
    f.render_widget(table, area);
}

fn draw_last_winners(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let items: Vec<ListItem> = if snap.winners.is_empty() {
        vec![ListItem::new("No winners yet")]
    } else {
        snap.winners
            .iter()
            .map(|w| {
                ListItem::new(format!(
                    "{}  Won {}  {}",
                    short_key(&w.wallet_address),
                    format_tokens(w.prize_amount),
                    w.resolved_at.format("%Y-%m-%d %H:%M")
                ))
            })
            .collect()
    };
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Last Winners"));
    f.render_widget(list, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let status_widget = if snap.errors.is_empty() {
        let text = if snap.status.trim().is_empty() {
            String::from("Ready")
        } else {
            snap.status.clone()
        };
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let lines: Vec<Line> = snap
            .errors
            .iter()
            .rev()
            .map(|e| Line::from(e.clone()))
            .collect();
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, chunks[0]);

    let help =
        Paragraph::new("d deposit | r refresh | c clear errors | i introduction | q/Esc quit")
            .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[1]);
}

fn draw_celebration(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    let Some(winner) = &snap.wheel.winner else {
        return;
    };
    if snap.wheel.phase != SpinPhase::Revealed {
        return;
    }
    let full = f.area();
    if full.width == 0 || full.height == 0 {
        return;
    }
    for (x, y, color) in &state.confetti {
        let col = full.x + (x * f64::from(full.width.saturating_sub(1))) as u16;
        let row = full.y + (y * f64::from(full.height.saturating_sub(1))) as u16;
        f.render_widget(
            Paragraph::new("*").style(Style::default().fg(*color)),
            Rect::new(col, row, 1, 1),
        );
    }
    let area = centered_rect(50, 20, full);
    let block = Block::default().borders(Borders::ALL).title("Winner");
    let text = vec![
        Line::from(format!("{} won the round!", winner.identity))
            .style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(format!("Prize: {}", format_tokens(winner.prize_amount))),
    ];
    f.render_widget(Clear, area);
    f.render_widget(block.clone(), area);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center),
        block.inner(area),
    );
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match &state.mode {
        Mode::DepositModal(form) => {
            let area = centered_rect(50, 35, f.area());
            let block = Block::default().borders(Borders::ALL).title("Deposit");
            let cursor = |field: DepositField| if form.focus == field { ">" } else { " " };
            let mut lines = vec![
                Line::from(format!("{} Name:   {}", cursor(DepositField::Name), form.name)),
                Line::from(format!(
                    "{} Amount: {} tokens",
                    cursor(DepositField::Amount),
                    form.amount
                )),
                Line::from(""),
            ];
            if !snap.wheel.deposits_open {
                lines.push(
                    Line::from("Deposits are closed for this round")
                        .style(Style::default().fg(Color::Yellow)),
                );
            }
            if snap.wallet.is_none() {
                lines.push(
                    Line::from("Connect a wallet with --wallet to deposit")
                        .style(Style::default().fg(Color::Yellow)),
                );
            }
            lines.push(Line::from("Tab switch field | Enter confirm | Esc cancel"));
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(Paragraph::new(lines), block.inner(area));
        }
        Mode::IntroModal { step } => {
            let area = centered_rect(60, 40, f.area());
            let (title, body) = INTRO_STEPS[(*step).min(INTRO_STEPS.len() - 1)];
            let block = Block::default()
                .borders(Borders::ALL)
                .title(format!("{}/{}", step + 1, INTRO_STEPS.len()));
            let button = if step + 1 < INTRO_STEPS.len() {
                "[Enter] Next"
            } else {
                "[Enter] Get Started"
            };
            let lines = vec![
                Line::from(title).style(Style::default().add_modifier(Modifier::BOLD)),
                Line::from(""),
                Line::from(body),
                Line::from(""),
                Line::from(button),
            ];
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(
                Paragraph::new(lines).wrap(Wrap { trim: true }),
                block.inner(area),
            );
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            let block = Block::default().borders(Borders::ALL).title("Confirm Quit");
            let p = Paragraph::new("Quit the game? (Y/N)");
            f.render_widget(Clear, area);
            f.render_widget(block.clone(), area);
            f.render_widget(p, block.inner(area));
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}

/// Clockwise from twelve o'clock, y pointing up.
fn polar(angle: f64, radius: f64) -> (f64, f64) {
    let rad = angle.to_radians();
    (radius * rad.sin(), radius * rad.cos())
}

/// The segment a wheel turned by `rotation` shows under the indicator.
fn segment_under_indicator(segments: &[Segment], rotation: f64) -> Option<&Segment> {
    let local = (INDICATOR_ANGLE - rotation).rem_euclid(FULL_TURN);
    segments.iter().find(|s| s.contains_angle(local))
}

/// Evenly spaced hues, `hsl(i * step, 70%, 50%)`.
fn segment_color(index: usize, count: usize) -> Color {
    let step = (FULL_TURN / count.max(1) as f64).floor();
    let (r, g, b) = hsl_to_rgb(index as f64 * step, 0.7, 0.5);
    Color::Rgb(r, g, b)
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> (u8, u8, u8) {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = hue.rem_euclid(FULL_TURN) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r), channel(g), channel(b))
}

/// `(name, deposit, chance %)`, largest deposit first.
fn leaderboard_rows(participants: &[Participant]) -> Vec<(String, f64, f64)> {
    let total = total_deposits(participants);
    participants
        .iter()
        .sorted_by(|a, b| b.deposit_total.total_cmp(&a.deposit_total))
        .map(|p| {
            let chance = if total > 0.0 {
                p.deposit_total * 100.0 / total
            } else {
                0.0
            };
            (
                truncate_to_width(&p.identity, NAME_COLUMN_WIDTH),
                p.deposit_total,
                chance,
            )
        })
        .collect()
}

/// Fits `text` into `width` columns, the ellipsis included.
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let budget = width.saturating_sub(1);
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    out.push('…');
    out
}

fn format_tokens(amount: f64) -> String {
    format!("{amount:.2} tokens")
}

fn format_countdown(left: TimeDelta) -> String {
    let secs = left.num_seconds().max(0);
    format!("{}m {:02}s", secs / 60, secs % 60)
}

fn scatter_confetti<R: Rng>(rng: &mut R, pieces: usize) -> Vec<(f64, f64, Color)> {
    (0..pieces)
        .map(|_| {
            let hue = rng.random_range(0.0..FULL_TURN);
            let (r, g, b) = hsl_to_rgb(hue, 0.7, 0.5);
            (
                rng.random_range(0.0..1.0),
                rng.random_range(0.0..1.0),
                Color::Rgb(r, g, b),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use wheel::compute_segments;

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(state: &mut UiState, text: &str) {
        for c in text.chars() {
            interpret_event(state, key(KeyCode::Char(c)));
        }
    }

    #[test]
    fn segment_under_indicator__matches_resolved_spin() {
        // given
        let segments = compute_segments(&[
            Participant::new("A", 70.0, "AKEY"),
            Participant::new("B", 30.0, "BKEY"),
        ]);

        // when
        let at_rest = segment_under_indicator(&segments, 0.0);
        let after_spin = segment_under_indicator(&segments, 5409.0);

        // then
        assert_eq!(at_rest.map(|s| s.owner.as_str()), Some("B"));
        assert_eq!(after_spin.map(|s| s.owner.as_str()), Some("B"));
        assert_eq!(
            segment_under_indicator(&segments, 180.0).map(|s| s.owner.as_str()),
            Some("A")
        );
    }

    #[test]
    fn leaderboard_rows__sorted_with_chances() {
        let rows = leaderboard_rows(&[
            Participant::new("bob", 30.0, "B"),
            Participant::new("a_very_long_player_name", 70.0, "A"),
        ]);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "a_very_lo…");
        assert_eq!(rows[0].0.width(), NAME_COLUMN_WIDTH);
        assert_eq!(rows[0].2, 70.0);
        assert_eq!(rows[1].0, "bob");
        assert_eq!(rows[1].2, 30.0);
    }

    #[test]
    fn truncate_to_width__counts_wide_characters() {
        assert_eq!(truncate_to_width("ｆｕｌｌｗｉｄｔｈ", 5), "ｆｕ…");
        assert_eq!(truncate_to_width("ｆｕｌｌｗｉｄｔｈ", 4), "ｆ…");
        assert_eq!(truncate_to_width("ｆｕ", 4), "ｆｕ");
        assert_eq!(truncate_to_width("short", 10), "short");
    }

    #[test]
    fn format_countdown__minutes_and_padded_seconds() {
        assert_eq!(format_countdown(TimeDelta::seconds(65)), "1m 05s");
        assert_eq!(format_countdown(TimeDelta::seconds(-3)), "0m 00s");
    }

    #[test]
    fn segment_color__first_hue_is_red() {
        assert_eq!(segment_color(0, 3), Color::Rgb(217, 38, 38));
        assert_ne!(segment_color(1, 3), segment_color(2, 3));
    }

    #[test]
    fn interpret_event__intro_walks_three_steps() {
        // given
        let mut state = UiState::new(true);

        // when
        let first = interpret_event(&mut state, key(KeyCode::Enter));
        let second = interpret_event(&mut state, key(KeyCode::Enter));
        let last = interpret_event(&mut state, key(KeyCode::Enter));

        // then
        assert_eq!(first, Some(UserEvent::Redraw));
        assert_eq!(second, Some(UserEvent::Redraw));
        assert_eq!(last, Some(UserEvent::IntroFinished));
        assert_eq!(state.mode, Mode::Normal);
    }

    #[test]
    fn interpret_event__deposit_form_collects_name_and_amount() {
        // given
        let mut state = UiState::new(false);
        interpret_event(&mut state, key(KeyCode::Char('d')));

        // when
        type_text(&mut state, "alice");
        interpret_event(&mut state, key(KeyCode::Enter));
        type_text(&mut state, "2x.5");
        let confirmed = interpret_event(&mut state, key(KeyCode::Enter));

        // then
        assert_eq!(
            confirmed,
            Some(UserEvent::ConfirmDeposit {
                name: "alice".to_string(),
                amount: "2.5".to_string(),
            })
        );
        assert_eq!(state.mode, Mode::Normal);
        assert_eq!(state.last_name, "alice");
    }

    #[test]
    fn interpret_event__quit_needs_confirmation() {
        let mut state = UiState::new(false);

        assert_eq!(
            interpret_event(&mut state, key(KeyCode::Char('q'))),
            Some(UserEvent::Redraw)
        );
        assert_eq!(
            interpret_event(&mut state, key(KeyCode::Char('y'))),
            Some(UserEvent::Quit)
        );
    }
}
