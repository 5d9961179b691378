// Terminal control panel: two motor sliders, an all-stop, and the driver's output log
//
// Keys: Up/Down/Tab select slider, Left/Right move it (Shift for fine steps),
// 0 centres it, Space stops everything, Q/Esc quits.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use embedded_hal::i2c::I2c;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::interval;
use tracing::{info, warn};

use crate::config::{
    LOOP_HZ, OUTPUT_LINES, SLIDER_FINE_STEP, SLIDER_MAX, SLIDER_MIN, SLIDER_STEP,
};
use crate::messages::ControllerMessage;
use crate::motor::{Motor, MotorDriver};

/// What the panel asks the driver to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PanelAction {
    SetMotor1(f32),
    SetMotor2(f32),
    Quit,
}

/// Panel state, independent of the terminal
#[derive(Debug, Clone, Default)]
pub struct Panel {
    motor1: f32,
    motor2: f32,
    selected_two: bool,
    // newest last, at most OUTPUT_LINES
    output: VecDeque<String>,
}

impl Panel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slider(&self, motor: Motor) -> f32 {
        match motor {
            Motor::Two => self.motor2,
            _ => self.motor1,
        }
    }

    pub fn selected(&self) -> Motor {
        if self.selected_two { Motor::Two } else { Motor::One }
    }

    /// The retained output log as one block of text
    pub fn output(&self) -> String {
        self.output.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }

    /// The newest `n` output lines, oldest first
    pub fn output_tail(&self, n: usize) -> impl Iterator<Item = &str> {
        let start = self.output.len().saturating_sub(n);
        self.output.range(start..).map(String::as_str)
    }

    /// Move a slider; only a changed value is forwarded
    pub fn set_slider(&mut self, motor: Motor, value: f32) -> Option<PanelAction> {
        // hundredths keep repeated steps from drifting
        let value = ((value.clamp(SLIDER_MIN, SLIDER_MAX)) * 100.0).round() / 100.0;
        let slot = match motor {
            Motor::Two => &mut self.motor2,
            _ => &mut self.motor1,
        };
        if *slot == value {
            return None;
        }
        *slot = value;
        Some(match motor {
            Motor::Two => PanelAction::SetMotor2(value),
            _ => PanelAction::SetMotor1(value),
        })
    }

    /// Zero both sliders
    pub fn all_stop(&mut self) -> Vec<PanelAction> {
        [Motor::One, Motor::Two]
            .into_iter()
            .filter_map(|motor| self.set_slider(motor, 0.0))
            .collect()
    }

    /// Append a message, separated from the previous one by a blank line
    ///
    /// Only the newest `OUTPUT_LINES` lines are kept.
    pub fn append_output(&mut self, text: &str) {
        if !self.output.is_empty() {
            self.output.push_back(String::new());
        }
        self.output.extend(text.lines().map(str::to_owned));
        while self.output.len() > OUTPUT_LINES {
            self.output.pop_front();
        }
        // never start on a separator
        if self.output.front().is_some_and(|line| line.is_empty()) {
            self.output.pop_front();
        }
    }

    fn step(&mut self, delta: f32) -> Option<PanelAction> {
        let motor = self.selected();
        let value = self.slider(motor) + delta;
        self.set_slider(motor, value)
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<PanelAction> {
        let KeyEvent {
            code,
            modifiers,
            kind,
            ..
        } = key;
        let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
        if !pressed {
            return Vec::new();
        }
        let step = if modifiers.contains(KeyModifiers::SHIFT) {
            SLIDER_FINE_STEP
        } else {
            SLIDER_STEP
        };

        match code {
            KeyCode::Up | KeyCode::Down | KeyCode::Tab => {
                self.selected_two = !self.selected_two;
                Vec::new()
            }
            KeyCode::Right => self.step(step).into_iter().collect(),
            KeyCode::Left => self.step(-step).into_iter().collect(),
            KeyCode::Char('0') => {
                let motor = self.selected();
                self.set_slider(motor, 0.0).into_iter().collect()
            }
            KeyCode::Char(' ') => self.all_stop(),
            KeyCode::Char('q') | KeyCode::Esc => vec![PanelAction::Quit],
            _ => Vec::new(),
        }
    }
}

/// Draw a slider as a bar centred on zero
pub fn slider_bar(value: f32, width: usize) -> String {
    let half = width / 2;
    let filled = (value.abs().min(1.0) * half as f32).round() as usize;
    let mut bar: Vec<char> = vec![' '; half * 2 + 1];
    bar[half] = '|';
    if value > 0.0 {
        for c in &mut bar[half + 1..=half + filled] {
            *c = '=';
        }
    } else if value < 0.0 {
        for c in &mut bar[half - filled..half] {
            *c = '=';
        }
    }
    format!("[{}]", bar.into_iter().collect::<String>())
}

fn render(panel: &Panel, out: &mut impl Write) -> io::Result<()> {
    let (cols, rows) = terminal::size()?;
    let bar_width = (cols as usize).saturating_sub(24).clamp(10, 60);

    queue!(out, MoveTo(0, 0), Clear(ClearType::All))?;
    queue!(
        out,
        Print("PicoBorg Reverse   (arrows: adjust, space: all stop, q: quit)")
    )?;
    for (row, motor) in [(2u16, Motor::One), (3u16, Motor::Two)] {
        let marker = if panel.selected() == motor { '>' } else { ' ' };
        let value = panel.slider(motor);
        queue!(
            out,
            MoveTo(0, row),
            Print(format!(
                "{} {} {:+.2} {}",
                marker,
                motor.label(),
                value,
                slider_bar(value, bar_width)
            ))
        )?;
    }

    // keep the newest output visible
    let log_top = 5u16;
    let visible = rows.saturating_sub(log_top) as usize;
    for (i, line) in panel.output_tail(visible).enumerate() {
        let shown: String = line.chars().take(cols as usize).collect();
        queue!(out, MoveTo(0, log_top + i as u16), Print(shown))?;
    }
    out.flush()
}

fn forward<I2C: I2c>(driver: &mut MotorDriver<I2C>, action: PanelAction) {
    let result = match action {
        PanelAction::SetMotor1(power) => driver.set_motor1(power),
        PanelAction::SetMotor2(power) => driver.set_motor2(power),
        PanelAction::Quit => return,
    };
    // already reported to the output log by the driver
    if let Err(e) = result {
        warn!("{:?} failed: {}", action, e);
    }
}

async fn run_loop<I2C: I2c>(
    driver: &mut MotorDriver<I2C>,
    panel: &mut Panel,
    messages: &mut UnboundedReceiver<ControllerMessage>,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    if let Err(e) = driver.initialize() {
        warn!("Continuing without an initialized board: {}", e);
    }

    loop {
        tick.tick().await;

        // 1. Handle all pending key presses
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                for action in panel.handle_key(key) {
                    if action == PanelAction::Quit {
                        return Ok(());
                    }
                    forward(driver, action);
                }
            }
        }

        // 2. Move driver messages onto the panel
        while let Ok(msg) = messages.try_recv() {
            panel.append_output(&msg.message);
        }

        // 3. Redraw
        render(panel, out)?;
    }
}

/// Run the panel until the user quits; the board is initialized once the panel is up
pub async fn run<I2C: I2c>(
    mut driver: MotorDriver<I2C>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut messages = driver.subscribe();
    let mut panel = Panel::new();
    let mut stdout = io::stdout();

    info!("Starting control panel");
    terminal::enable_raw_mode()?;
    execute!(stdout, EnterAlternateScreen, Hide)?;

    let result = run_loop(&mut driver, &mut panel, &mut messages, &mut stdout).await;

    execute!(stdout, Show, LeaveAlternateScreen)?;
    terminal::disable_raw_mode()?;
    result
}
