use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::clock::Clock;
use crate::critics::PUBLICATION;
use crate::storage::KeyValueStore;
use crate::theatre::Theatre;
use crate::util::{round1, star_bar};

const HORIZONTAL_MARGIN: u16 = 5;

/// Plain-text view of a [`Theatre`]: where we are, the script, and meters.
pub struct Stage<'a, S: KeyValueStore, C: Clock> {
    theatre: &'a Theatre<S, C>,
}

impl<'a, S: KeyValueStore, C: Clock> Stage<'a, S, C> {
    pub fn new(theatre: &'a Theatre<S, C>) -> Self {
        Self { theatre }
    }

    fn header(&self) -> Vec<Line<'static>> {
        let act = self.theatre.act();
        let pos = self.theatre.position();
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let scene = act.scene(pos);
        let exercise = act.exercise(pos);

        let mut lines = vec![Line::from(Span::styled(
            format!(
                "Act {}: {} • Scene {}/{}",
                act.act,
                act.title,
                pos.scene + 1,
                act.scenes.len()
            ),
            bold.fg(Color::Yellow),
        ))];
        if let (Some(scene), Some(exercise)) = (scene, exercise) {
            lines.push(Line::from(format!(
                "{} - {} ({}/{})",
                scene.name,
                exercise.title,
                pos.exercise + 1,
                scene.exercises.len()
            )));
        }
        lines
    }

    fn script(&self) -> Line<'static> {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let green_bold_style = Style::default().patch(bold_style).fg(Color::Green);
        let red_bold_style = Style::default().patch(bold_style).fg(Color::Red);
        let dim_bold_style = Style::default()
            .patch(bold_style)
            .add_modifier(Modifier::DIM);
        let underlined_dim_bold_style = Style::default()
            .patch(dim_bold_style)
            .add_modifier(Modifier::UNDERLINED);

        let session = self.theatre.engine().session();
        let typed: Vec<char> = session.typed_text().chars().collect();
        let target: Vec<char> = session.target_text().chars().collect();

        let spans = target
            .iter()
            .enumerate()
            .map(|(idx, &expected)| match typed.get(idx) {
                Some(&c) if session.is_mistake(idx) => Span::styled(
                    match c {
                        ' ' => "·".to_owned(),
                        c => c.to_string(),
                    },
                    red_bold_style,
                ),
                Some(_) => Span::styled(expected.to_string(), green_bold_style),
                None if idx == session.cursor() => {
                    Span::styled(expected.to_string(), underlined_dim_bold_style)
                }
                None => Span::styled(expected.to_string(), dim_bold_style),
            })
            .collect::<Vec<_>>();
        Line::from(spans)
    }

    fn meters(&self) -> Line<'static> {
        let perf = &self.theatre.state().performance;
        Line::from(vec![
            Span::styled(format!("{:.0} wpm", perf.tempo), Style::default().fg(Color::Magenta)),
            Span::raw("  "),
            Span::raw(format!("{}% accuracy", round1(perf.accuracy))),
            Span::raw("  "),
            Span::raw(format!("streak {}", perf.no_look_streak)),
            Span::raw("  "),
            Span::styled(
                format!("directions {:.0}%", perf.stage_directions_opacity * 100.0),
                Style::default().add_modifier(Modifier::DIM),
            ),
        ])
    }

    fn status(&self) -> Option<Line<'static>> {
        let state = self.theatre.state();
        let italic = Style::default().add_modifier(Modifier::ITALIC);
        if let Some(critique) = self.theatre.critique() {
            let review = &critique.review;
            return Some(Line::from(vec![
                Span::styled(star_bar(review.stars), Style::default().fg(Color::Yellow)),
                Span::styled(
                    format!("  {}", critique.headline),
                    Style::default().add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!(
                    "  {:.0} wpm  {}%",
                    review.tempo,
                    round1(review.accuracy)
                )),
            ]));
        }
        if !state.production.curtains_open {
            return Some(Line::from(Span::styled(
                "The curtains are closed. Press any key to begin.",
                italic.fg(Color::Yellow),
            )));
        }
        if self.theatre.engine().is_paused() {
            return Some(Line::from(Span::styled("PAUSED", italic)));
        }
        if state.performance.in_panic_mode {
            return Some(Line::from(Span::styled(
                "Stage fright! Directions restored.",
                italic.fg(Color::Red),
            )));
        }
        None
    }

    fn notice(&self) -> Option<Vec<Line<'static>>> {
        let critique = self.theatre.critique()?;
        let italic = Style::default().add_modifier(Modifier::ITALIC);
        Some(vec![
            Line::from(Span::styled(format!("\"{}\"", critique.text), italic)),
            Line::from(Span::styled(
                format!("- {PUBLICATION}"),
                Style::default().add_modifier(Modifier::DIM),
            )),
        ])
    }

    fn footer(&self) -> Line<'static> {
        let actor = &self.theatre.state().actor;
        let role = actor.role.map(|r| r.title()).unwrap_or("Understudy");
        let code = actor.continuation_code.as_deref().unwrap_or("-");
        Line::from(Span::styled(
            format!("{} as {}  •  code {}  •  xp {}", actor.name, role, code, actor.experience),
            Style::default().add_modifier(Modifier::DIM),
        ))
    }
}

impl<S: KeyValueStore, C: Clock> Widget for Stage<'_, S, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let target = self.theatre.engine().session().target_text();
        let max_chars_per_line = area.width.saturating_sub(HORIZONTAL_MARGIN * 2).max(1);
        let script_lines = (target.width() as f64 / max_chars_per_line as f64).ceil().max(1.0) as u16;

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(1),
                Constraint::Length(script_lines),
                Constraint::Length(1),
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(area);

        Paragraph::new(self.header())
            .alignment(Alignment::Center)
            .render(chunks[0], buf);
        Paragraph::new(self.script())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);
        Paragraph::new(self.meters())
            .alignment(Alignment::Center)
            .render(chunks[3], buf);
        if let Some(status) = self.status() {
            Paragraph::new(status)
                .alignment(Alignment::Center)
                .render(chunks[4], buf);
        }
        if let Some(notice) = self.notice() {
            Paragraph::new(notice)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(chunks[5], buf);
        }
        Paragraph::new(self.footer())
            .alignment(Alignment::Center)
            .render(chunks[6], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::keys::Key;
    use crate::scripts::Act;
    use crate::storage::MemoryStore;
    use ratatui::{backend::TestBackend, Terminal};

    fn render(theatre: &Theatre<MemoryStore, &ManualClock>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal
            .draw(|f| f.render_widget(Stage::new(theatre), f.area()))
            .unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn closed_curtains_prompt() {
        let clock = ManualClock::new(0);
        let theatre = Theatre::new(MemoryStore::new(), &clock, Act::act_one().unwrap());
        let content = render(&theatre);
        assert!(content.contains("curtains are closed"));
        assert!(content.contains("Finding Your Stage Legs"));
    }

    #[test]
    fn review_shows_stars() {
        let clock = ManualClock::new(0);
        let act = Act::from_json(
            r#"{"act": 1, "title": "T", "scenes": [{"id": "s", "name": "S", "exercises": [
                {"id": "e", "title": "E", "script": "hi"}]}]}"#,
        )
        .unwrap();
        let mut theatre = Theatre::new(MemoryStore::new(), &clock, act);
        theatre.raise_curtain();
        theatre.on_key(Key::Char('h'), false);
        theatre.on_key(Key::Char('i'), false);
        let content = render(&theatre);
        assert!(content.contains("★★★★★"), "{content}");
        let headline = theatre.critique().unwrap().headline;
        assert!(content.contains(headline), "{content}");
        assert!(content.contains("An absolutely captivating"), "{content}");
    }
}
