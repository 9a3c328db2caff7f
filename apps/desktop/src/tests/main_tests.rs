use super::*;

#[test]
fn parses_commands_and_aliases() {
    assert_eq!(Command::parse("next"), Some(Command::Next));
    assert_eq!(Command::parse("  SAVE "), Some(Command::Save));
    assert_eq!(Command::parse("q"), Some(Command::Quit));
    assert_eq!(Command::parse("refresh"), Some(Command::Refresh));
    assert_eq!(Command::parse("dismiss"), Some(Command::Dismiss));
    assert_eq!(Command::parse("store it"), None);
}

#[test]
fn describes_selection_in_insertion_order() {
    let selection = Selection::from_cards([
        Card::new("2", "Raichu", "r.png"),
        Card::new("1", "Pikachu", "p.png"),
    ]);

    assert_eq!(
        describe_selection(&selection),
        "stored 2/6\n  1. Raichu [2] r.png\n  2. Pikachu [1] p.png"
    );
    assert_eq!(describe_selection(&Selection::new()), "stored 0/6");
}

#[test]
fn cli_flags_are_optional() {
    let args = Args::try_parse_from(["pick-six", "--server-url", "http://cards:3000"])
        .expect("args");
    assert_eq!(args.server_url.as_deref(), Some("http://cards:3000"));
    assert!(args.cache_url.is_none());
}

fn offline_controller() -> SelectionController {
    let remote = HttpRemoteStore::new("http://127.0.0.1:9").expect("url");
    let cache = Arc::new(storage::MemoryCache::new());
    SelectionController::new(Arc::new(remote), LocalMirror::with_default_key(cache))
}

#[tokio::test]
async fn failed_save_reports_its_error_once() {
    let controller = offline_controller();

    let out = execute(&controller, Command::Save).await;

    assert_eq!(out, "error: no card to store");
    assert_eq!(execute(&controller, Command::Dismiss).await, "");
    assert_eq!(
        execute(&controller, Command::Show).await,
        "candidate: none\nstored 0/6"
    );
}

#[tokio::test]
async fn event_log_keeps_going_after_lagging() {
    let (tx, rx) = broadcast::channel(2);
    for id in ["1", "2", "3", "4"] {
        tx.send(SelectionEvent::RandomCardChanged(Card::new(id, "c", "u")))
            .expect("send");
    }
    drop(tx);

    assert_eq!(log_events(rx).await, 2);
}
