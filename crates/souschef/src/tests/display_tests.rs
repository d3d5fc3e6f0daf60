use super::*;
use crate::test_support::recipe;

const PASTA: &str = r#"
[1.1]
action = "set_fixed_setpoint"
message = "Heat the pan"
args = { value = 100 }

[1.2]
action = "classify"
message = "Wait for the water to boil"
args = { model = "water", label = "boiling" }

[2.1]
action = "set_hob_off"
message = "Drain and serve"
"#;

#[test]
fn start_of_recipe_shows_connected_placeholder() {
    let display = DisplayState::derive(&recipe(PASTA), Position::new(1, 1));

    assert_eq!(display.previous_message, CONNECTED_MESSAGE);
    assert_eq!(display.current_message, "Heat the pan");
    assert_eq!(display.next_message, "Wait for the water to boil");
}

#[test]
fn neighbours_follow_execution_order_across_steps() {
    let recipe = recipe(PASTA);

    let display = DisplayState::derive(&recipe, Position::new(1, 2));
    assert_eq!(display.previous_message, "Heat the pan");
    assert_eq!(display.next_message, "Drain and serve");

    let display = DisplayState::derive(&recipe, Position::new(2, 1));
    assert_eq!(display.previous_message, "Wait for the water to boil");
    assert_eq!(display.next_message, COMPLETE_MESSAGE);
}

#[test]
fn missing_position_degrades_to_placeholders() {
    let display = DisplayState::derive(&recipe(PASTA), Position::new(7, 1));

    assert_eq!(display.previous_message, CONNECTED_MESSAGE);
    assert_eq!(display.current_message, MISSING_MESSAGE);
    assert_eq!(display.next_message, COMPLETE_MESSAGE);
}

#[test]
fn completed_display_keeps_last_instruction_as_previous() {
    let display = DisplayState::complete(&recipe(PASTA));

    assert_eq!(display.previous_message, "Drain and serve");
    assert_eq!(display.current_message, COMPLETE_MESSAGE);
    assert_eq!(display.next_message, COMPLETE_MESSAGE);
}

#[test]
fn subscribers_are_woken_only_on_change() {
    let recipe = recipe(PASTA);
    let cache = DisplayCache::new(DisplayState::derive(&recipe, Position::new(1, 1)));
    let mut rx = cache.subscribe();

    assert!(!cache.refresh(&recipe, Position::new(1, 1)));
    assert!(!rx.has_changed().expect("sender alive"));

    assert!(cache.refresh(&recipe, Position::new(1, 2)));
    assert!(rx.has_changed().expect("sender alive"));
    assert_eq!(
        rx.borrow_and_update().current_message,
        "Wait for the water to boil"
    );
    assert_eq!(cache.current().previous_message, "Heat the pan");
}
