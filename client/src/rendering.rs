//! Text rendering of session snapshots
//!
//! Snapshots carry every card's value; face-down cards are masked here.

use shared::{themes, Snapshot};
use std::fmt::Write;

const COLUMNS: usize = 4;
const FACE_DOWN: &str = "❓";

pub fn render(snapshot: &Snapshot, me: Option<u32>) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Memory Match | theme: {} ===", snapshot.theme_label);
    render_players(&mut out, snapshot, me);
    out.push('\n');
    render_board(&mut out, snapshot);

    if snapshot.is_finished {
        out.push_str("\nGame over! All pairs found.\n");
    }

    out.push('\n');
    render_history(&mut out, snapshot);
    out
}

fn render_players(out: &mut String, snapshot: &Snapshot, me: Option<u32>) {
    if snapshot.players.is_empty() {
        out.push_str("No players connected.\n");
        return;
    }

    for (index, player) in snapshot.players.iter().enumerate() {
        let marker = if index == snapshot.turn { '>' } else { ' ' };
        let you = if Some(player.id) == me { " (you)" } else { "" };
        let _ = writeln!(out, " {} {}{}: {}", marker, player.name, you, player.score);
    }

    let status = match snapshot.current_player() {
        Some(_) if me.map_or(false, |id| snapshot.is_turn_of(id)) => "Your turn.".to_string(),
        Some(current) => format!("Waiting for {}...", current.name),
        None => String::new(),
    };
    let _ = writeln!(out, "{}", status);
}

fn render_board(out: &mut String, snapshot: &Snapshot) {
    for row in snapshot.cards.chunks(COLUMNS) {
        let cells: Vec<String> = row
            .iter()
            .map(|card| {
                let face = if card.is_face_up() {
                    card.value.as_str()
                } else {
                    FACE_DOWN
                };
                format!("[{:>2} {}]", card.id + 1, face)
            })
            .collect();
        let _ = writeln!(out, "  {}", cells.join(" "));
    }
}

fn render_history(out: &mut String, snapshot: &Snapshot) {
    if snapshot.move_history.is_empty() {
        out.push_str("No moves yet.\n");
        return;
    }

    out.push_str("Moves (newest first):\n");
    for record in snapshot.move_history.iter().rev() {
        let mark = if record.success { "✅" } else { "❌" };
        let _ = writeln!(out, "  {}: {} {}", record.player_name, record.description, mark);
    }
}

pub fn render_themes() -> String {
    let mut out = String::from("themes:\n");
    for theme in themes() {
        let _ = writeln!(out, "  {:<8} {} {}", theme.key, theme.label, theme.symbols.join(""));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{Card, MoveRecord, Player};

    fn snapshot() -> Snapshot {
        let mut cards: Vec<Card> = (0..16).map(|id| Card::new(id, "🐶")).collect();
        cards[2].is_revealed = true;
        cards[2].value = "🦊".to_string();
        cards[5].is_matched = true;
        cards[5].value = "🐼".to_string();

        Snapshot {
            players: vec![
                Player::new(1, "Ana".to_string()),
                Player::new(2, "Bruno".to_string()),
            ],
            turn: 1,
            cards,
            revealed_indices: vec![2],
            move_history: vec![
                MoveRecord {
                    player_name: "Ana".to_string(),
                    description: "first".to_string(),
                    success: true,
                    timestamp: 1,
                },
                MoveRecord {
                    player_name: "Bruno".to_string(),
                    description: "second".to_string(),
                    success: false,
                    timestamp: 2,
                },
            ],
            is_finished: false,
            theme_key: "animals".to_string(),
            theme_label: "Animals".to_string(),
        }
    }

    #[test]
    fn test_face_down_values_are_hidden() {
        let text = render(&snapshot(), None);

        assert!(text.contains("[ 3 🦊]"));
        assert!(text.contains("[ 6 🐼]"));
        assert!(text.contains("[ 1 ❓]"));
        assert!(!text.contains("🐶"));
        assert_eq!(text.lines().filter(|l| l.starts_with("  [")).count(), 4);
    }

    #[test]
    fn test_turn_marker_and_status() {
        let text = render(&snapshot(), Some(2));
        assert!(text.contains(" > Bruno (you): 0"));
        assert!(text.contains("   Ana: 0"));
        assert!(text.contains("Your turn."));

        let text = render(&snapshot(), Some(1));
        assert!(text.contains("Waiting for Bruno..."));

        let text = render(&snapshot(), None);
        assert!(text.contains("Waiting for Bruno..."));
        assert!(!text.contains("Your turn."));
    }

    #[test]
    fn test_history_newest_first() {
        let text = render(&snapshot(), None);
        let second = text.find("Bruno: second").unwrap();
        let first = text.find("Ana: first").unwrap();
        assert!(second < first);
    }

    #[test]
    fn test_empty_and_finished() {
        let mut empty = snapshot();
        empty.players.clear();
        empty.move_history.clear();
        empty.is_finished = true;

        let text = render(&empty, None);
        assert!(text.contains("No players connected."));
        assert!(text.contains("No moves yet."));
        assert!(text.contains("Game over!"));
    }

    #[test]
    fn test_render_themes_lists_registry() {
        let text = render_themes();
        for theme in themes() {
            assert!(text.contains(theme.key));
            assert!(text.contains(theme.label));
        }
    }
}
