//! End-to-end games over an in-memory mailbox.

mod common;

use common::*;
use postal_chess::{
    SessionKey, SessionStore, Terminal, TerminalKind, TickError, TickOutcome, TurnState,
};
use postal_chess_notation::Side;
use std::sync::Arc;

#[tokio::test]
async fn new_game_opens_thread_and_waits_for_white() {
    let h = Harness::new();
    let session = h.service.start_new_game().await.unwrap();

    assert_eq!(h.mailbox.thread_count(), 1);
    assert_eq!(TurnState::of(&session), TurnState::AwaitingPlayerMove);
    assert_eq!(*h.session().cursor(), 1);
    assert!(h.last_body().starts_with("[postal-chess] New game started. You play white"));
    assert!(h.last_body().contains("Your move."));
    assert_eq!(h.mailbox.labels().len(), 1);
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn legal_move_gets_an_answer() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.script_e4_e5();

    h.player_says("e4\n\nOn Mon, 5 Oct 2026, Chess wrote:\n> New game started.");
    let outcome = h.service.tick().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Dispatched {
            sequence_index: 1,
            notified: true
        }
    );
    let session = h.session();
    assert_eq!(session.position(), AFTER_E4_E5);
    assert_eq!(*session.turn_number(), 2);
    assert_eq!(session.move_log().render(), "1.e4 1...e5");
    assert_eq!(*session.cursor(), 2);

    let body = h.last_body();
    assert!(body.contains("You played 1.e4. I reply 1...e5."));
    assert!(body.contains("Moves: 1.e4 1...e5"));
}

#[tokio::test]
async fn own_replies_are_skipped_on_the_next_tick() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.script_e4_e5();
    h.player_says("e4");
    h.service.tick().await.unwrap();

    let sends = h.mailbox.sends();
    let outcome = h.service.tick().await.unwrap();
    assert_eq!(outcome, TickOutcome::Skipped { cursor: 3 });
    assert_eq!(h.service.tick().await.unwrap(), TickOutcome::NothingNew);
    assert_eq!(h.mailbox.sends(), sends);
}

#[tokio::test]
async fn unparseable_move_is_answered_with_the_guide() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();

    h.player_says("Qxf99");
    h.service.tick().await.unwrap();

    let body = h.last_body();
    assert!(body.contains("I could not read 'Qxf99' as a move"));
    assert_eq!(h.oracle.calls(), 0);
    assert_eq!(h.session().position(), START);
}

#[tokio::test]
async fn illegal_move_lists_alternatives_and_changes_nothing() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.oracle
        .illegal(START, "e5", "no white pawn can reach e5", &["e3", "e4", "Nf3"]);

    h.player_says("e5");
    h.service.tick().await.unwrap();

    let body = h.last_body();
    assert!(body.contains("'e5' is not legal here: no white pawn can reach e5."));
    assert!(body.contains("Some legal moves: e3, e4, Nf3"));
    let session = h.session();
    assert_eq!(session.position(), START);
    assert!(session.move_log().is_empty());
    assert_eq!(h.source.calls(), 0);
}

#[tokio::test]
async fn opponent_failure_keeps_player_move_and_resume_finishes_the_turn() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.oracle.legal(START, "e4", AFTER_E4, "e4");
    h.source.fail("engine unreachable");

    h.player_says("e4");
    let sends = h.mailbox.sends();
    let err = h.service.tick().await.unwrap_err();
    assert!(matches!(err, TickError::Opponent(_)));
    assert!(err.needs_operator());
    assert_eq!(h.mailbox.sends(), sends);

    let session = h.session();
    assert_eq!(session.position(), AFTER_E4);
    assert_eq!(TurnState::of(&session), TurnState::AwaitingOpponentMove);
    assert_eq!(*session.cursor(), 2);

    // The failed message is not dispatched again.
    assert_eq!(h.service.tick().await.unwrap(), TickOutcome::NothingNew);
    assert_eq!(h.source.calls(), 1);

    h.source.propose("e7e5");
    h.oracle.legal(AFTER_E4, "e7e5", AFTER_E4_E5, "e5");
    assert!(h.service.resume().await.unwrap());
    assert_eq!(h.session().position(), AFTER_E4_E5);
    assert!(h.last_body().contains("Sorry for the delay. I play 1...e5."));

    assert!(!h.service.resume().await.unwrap());
}

#[tokio::test]
async fn opponent_proposal_rejected_by_oracle_is_not_played() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.oracle.legal(START, "e4", AFTER_E4, "e4");
    h.source.propose("e7e4");

    h.player_says("e4");
    let err = h.service.tick().await.unwrap_err();
    assert!(matches!(err, TickError::Opponent(_)));
    assert_eq!(h.session().position(), AFTER_E4);
    assert_eq!(h.session().move_log().render(), "1.e4");
}

#[tokio::test]
async fn move_while_opponent_owes_a_reply_is_deferred() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.oracle.legal(START, "e4", AFTER_E4, "e4");
    h.source.fail("engine unreachable");
    h.player_says("e4");
    let _ = h.service.tick().await;

    h.player_says("d4");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("I still owe you a reply"));

    h.source.propose("e7e5");
    h.oracle.legal(AFTER_E4, "e7e5", AFTER_E4_E5, "e5");
    h.player_says("CONTINUE");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("I play 1...e5"));
}

#[tokio::test]
async fn oracle_outage_stops_the_tick_without_replaying() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.oracle.failing(START, "e4");

    h.player_says("e4");
    let err = h.service.tick().await.unwrap_err();
    assert!(matches!(err, TickError::Oracle(_)));
    assert_eq!(h.session().position(), START);
    assert_eq!(*h.session().cursor(), 2);

    h.service.tick().await.unwrap();
    assert_eq!(h.oracle.calls(), 1);
}

#[tokio::test]
async fn one_dispatch_per_tick() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.script_e4_e5();
    h.oracle.legal(AFTER_E4_E5, "Nf3", AFTER_E4_E5_NF3, "Nf3");
    h.source.propose("b8c6");
    h.oracle
        .legal(AFTER_E4_E5_NF3, "b8c6", AFTER_E4_E5_NF3_NC6, "Nc6");

    h.player_says("e4");
    h.player_says("Nf3");

    let first = h.service.tick().await.unwrap();
    assert_eq!(
        first,
        TickOutcome::Dispatched {
            sequence_index: 1,
            notified: true
        }
    );
    assert_eq!(h.session().position(), AFTER_E4_E5);

    let second = h.service.tick().await.unwrap();
    assert_eq!(
        second,
        TickOutcome::Dispatched {
            sequence_index: 2,
            notified: true
        }
    );
    assert_eq!(h.session().position(), AFTER_E4_E5_NF3_NC6);
    assert_eq!(h.session().move_log().render(), "1.e4 1...e5 2.Nf3 2...Nc6");
    assert_eq!(
        h.oracle.histories(),
        vec!["", "1.e4", "1.e4 1...e5", "1.e4 1...e5 2.Nf3"]
    );
}

#[tokio::test]
async fn chatter_is_skipped_and_the_move_after_it_is_played() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.script_e4_e5();

    h.player_says("thanks for the game!");
    h.player_says("e4");
    let outcome = h.service.tick().await.unwrap();

    assert_eq!(
        outcome,
        TickOutcome::Dispatched {
            sequence_index: 2,
            notified: true
        }
    );
    assert_eq!(h.session().position(), AFTER_E4_E5);
}

#[tokio::test]
async fn strangers_are_ignored() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    let sends = h.mailbox.sends();

    h.mailbox.write(&h.thread(), "Mallory <mallory@example.net>", "RESIGN");
    let outcome = h.service.tick().await.unwrap();

    assert_eq!(outcome, TickOutcome::Skipped { cursor: 2 });
    assert!(*h.session().active());
    assert_eq!(h.mailbox.sends(), sends);
}

#[tokio::test]
async fn display_name_and_case_do_not_matter_for_the_player() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();

    h.mailbox.write(&h.thread(), "Pat <PAT@Example.com>", "resign");
    h.service.tick().await.unwrap();
    assert!(!*h.session().active());
}

#[tokio::test]
async fn pause_blocks_moves_until_continue() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    h.script_e4_e5();

    h.player_says("PAUSE");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("Game paused."));
    assert_eq!(TurnState::of(&h.session()), TurnState::Paused);

    h.player_says("PAUSE");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("already paused"));

    h.player_says("e4");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("The game is paused, so 'e4' was not played."));
    assert_eq!(h.oracle.calls(), 0);

    h.player_says("Continue.");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("Game resumed."));

    h.player_says("CONTINUE");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("not paused"));

    h.player_says("e4");
    h.service.tick().await.unwrap();
    assert_eq!(h.session().position(), AFTER_E4_E5);
}

#[tokio::test]
async fn new_replaces_the_game_from_any_state() {
    let h = Harness::new();
    let first = h.service.start_new_game().await.unwrap();
    h.player_says("PAUSE");
    h.service.tick().await.unwrap();

    h.player_says("NEW");
    h.service.tick().await.unwrap();

    let session = h.session();
    assert_ne!(session.session_token(), first.session_token());
    assert_eq!(TurnState::of(&session), TurnState::AwaitingPlayerMove);
    assert_eq!(session.position(), START);
    assert_eq!(h.mailbox.thread_count(), 2);
    assert_eq!(*session.cursor(), 1);
}

#[tokio::test]
async fn resign_ends_the_game_and_later_moves_are_refused() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();

    h.player_says("RESIGN");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("You resigned. Black wins."));
    assert_eq!(TurnState::of(&h.session()), TurnState::Ended);
    assert_eq!(h.source.calls(), 0);

    h.player_says("e4");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("There is no game in progress."));
    assert_eq!(h.oracle.calls(), 0);
}

#[tokio::test]
async fn checkmate_by_the_player_ends_without_an_opponent_move() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();
    let before = "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4";
    let mated = "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4";
    h.store
        .put(SessionKey::Position.as_ref(), before)
        .unwrap();
    h.oracle.terminal(
        before,
        "Qxf7#",
        mated,
        "Qxf7#",
        Terminal {
            kind: TerminalKind::Checkmate,
            winner: Some(Side::White),
        },
    );

    h.player_says("Qxf7#");
    h.service.tick().await.unwrap();

    assert_eq!(h.source.calls(), 0);
    assert_eq!(TurnState::of(&h.session()), TurnState::Ended);
    assert_eq!(h.session().position(), mated);
    assert!(h.last_body().contains("Result: Checkmate - White wins"));
}

#[tokio::test]
async fn black_player_receives_the_opening() {
    let h = Harness::with(HarnessOptions {
        human_side: Side::Black,
        ..HarnessOptions::default()
    });
    h.source.propose_with_eval("e2e4", "+0.30");
    h.oracle.legal(START, "e2e4", AFTER_E4, "e4");

    let session = h.service.start_new_game().await.unwrap();

    assert_eq!(session.position(), AFTER_E4);
    assert_eq!(TurnState::of(&session), TurnState::AwaitingPlayerMove);
    let body = h.last_body();
    assert!(body.contains("I open with 1.e4. Your move."));
    assert!(body.contains("Evaluation: +0.30"));
}

#[tokio::test]
async fn black_player_whose_opening_failed_is_resumed_with_a_new_thread() {
    let h = Harness::with(HarnessOptions {
        human_side: Side::Black,
        ..HarnessOptions::default()
    });
    h.source.fail("engine unreachable");
    assert!(h.service.start_new_game().await.is_err());
    assert_eq!(h.mailbox.thread_count(), 0);
    assert_eq!(h.service.tick().await.unwrap(), TickOutcome::NoThread);

    h.source.propose("e2e4");
    h.oracle.legal(START, "e2e4", AFTER_E4, "e4");
    assert!(h.service.resume().await.unwrap());
    assert_eq!(h.mailbox.thread_count(), 1);
    assert!(h.last_body().contains("I open with 1.e4"));
}

#[tokio::test]
async fn rapid_moves_are_rate_limited() {
    let h = Harness::with(HarnessOptions {
        min_spacing: chrono::Duration::seconds(600),
        ..HarnessOptions::default()
    });
    h.service.start_new_game().await.unwrap();
    h.oracle.illegal(START, "e5", "no white pawn can reach e5", &[]);
    h.script_e4_e5();

    h.player_says("e5");
    h.service.tick().await.unwrap();
    h.player_says("e4");
    h.service.tick().await.unwrap();

    assert_eq!(h.oracle.calls(), 1);
    assert!(h.last_body().contains("'e4' was not played; please send it again"));
    assert_eq!(h.session().position(), START);
}

#[tokio::test]
async fn commentary_failure_does_not_block_the_reply() {
    let h = Harness::with(HarnessOptions {
        commentary: Some(Arc::new(BrokenCommentary)),
        ..HarnessOptions::default()
    });
    h.service.start_new_game().await.unwrap();
    h.script_e4_e5();

    h.player_says("e4");
    h.service.tick().await.unwrap();

    let body = h.last_body();
    assert!(body.contains("I reply 1...e5"));
    assert!(!body.contains("Coach:"));
}

#[tokio::test]
async fn commentary_is_included_when_available() {
    let h = Harness::with(HarnessOptions {
        commentary: Some(Arc::new(FixedCommentary("Both sides claim the centre."))),
        ..HarnessOptions::default()
    });
    h.service.start_new_game().await.unwrap();
    h.script_e4_e5();

    h.player_says("e4");
    h.service.tick().await.unwrap();
    assert!(h.last_body().contains("Coach: Both sides claim the centre."));
}

#[tokio::test]
async fn move_log_is_capped_without_losing_position() {
    let h = Harness::with(HarnessOptions {
        move_log_cap: 1,
        ..HarnessOptions::default()
    });
    h.service.start_new_game().await.unwrap();
    h.script_e4_e5();

    h.player_says("e4");
    h.service.tick().await.unwrap();

    let session = h.session();
    assert_eq!(session.position(), AFTER_E4_E5);
    assert_eq!(session.move_log().render(), "1.e4 ... (log truncated)");
}

#[tokio::test]
async fn tick_without_a_game_does_nothing() {
    let h = Harness::new();
    assert_eq!(h.service.tick().await.unwrap(), TickOutcome::NoSession);
    assert!(h.store.load_session().unwrap().is_none());
}

#[tokio::test]
async fn held_lock_makes_the_tick_fail() {
    let h = Harness::new();
    h.service.start_new_game().await.unwrap();

    let _held = h.lock.acquire().await.unwrap();
    let err = h.service.tick().await.unwrap_err();
    assert!(matches!(err, TickError::Lock(_)));
}

#[tokio::test]
async fn unlocated_new_thread_is_bound_on_the_next_tick() {
    let h = Harness::new();
    let first = h.service.start_new_game().await.unwrap();
    h.player_says("NEW");
    h.mailbox.miss_lookups(2);

    let err = h.service.tick().await.unwrap_err();
    assert!(matches!(err, TickError::Transport(_)));
    let stranded = h.store.load_session().unwrap().unwrap();
    assert_ne!(stranded.session_token(), first.session_token());
    assert!(stranded.thread_handle().is_none());
    assert_eq!(h.mailbox.thread_count(), 2);

    assert_eq!(
        h.service.tick().await.unwrap(),
        TickOutcome::Skipped { cursor: 1 }
    );
    assert_eq!(h.thread().as_str(), "thread-2");

    h.script_e4_e5();
    h.player_says("e4");
    h.service.tick().await.unwrap();
    assert_eq!(h.session().position(), AFTER_E4_E5);
}

#[tokio::test]
async fn player_reply_sent_before_the_thread_was_bound_is_read() {
    let h = Harness::new();
    h.mailbox.miss_lookups(2);
    assert!(h.service.start_new_game().await.is_err());

    let new_thread = postal_chess::ThreadHandle::new("thread-1");
    h.mailbox.write(&new_thread, PLAYER, "e4");
    h.script_e4_e5();

    let outcome = h.service.tick().await.unwrap();
    assert_eq!(
        outcome,
        TickOutcome::Dispatched {
            sequence_index: 1,
            notified: true
        }
    );
    assert_eq!(h.session().position(), AFTER_E4_E5);
}

#[tokio::test]
async fn resume_binds_a_thread_that_was_sent_but_not_found() {
    let h = Harness::new();
    h.mailbox.miss_lookups(2);
    assert!(h.service.start_new_game().await.is_err());

    assert!(h.service.resume().await.unwrap());
    assert_eq!(h.mailbox.thread_count(), 1);
    assert_eq!(h.thread().as_str(), "thread-1");
    assert!(!h.service.resume().await.unwrap());
}

#[tokio::test]
async fn resume_resends_an_opening_that_never_went_out() {
    let h = Harness::new();
    h.mailbox.fail_sends(1);
    assert!(h.service.start_new_game().await.is_err());
    assert_eq!(h.mailbox.thread_count(), 0);
    assert_eq!(h.service.tick().await.unwrap(), TickOutcome::NoThread);

    assert!(h.service.resume().await.unwrap());
    assert_eq!(h.mailbox.thread_count(), 1);
    assert!(h.last_body().contains("New game started. You play white"));
    assert_eq!(*h.session().cursor(), 1);
}
