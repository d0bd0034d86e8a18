//! Recording controller integration tests
//!
//! Drives the state machine with scripted audio levels and fake services
//! under tokio's paused clock, so silence timing and call deadlines are
//! deterministic.

use std::time::Duration;

use samtal::controller::Phase;
use samtal::{Error, Role};
use tokio_test::assert_ok;

mod common;
use common::{
    FakeAudio, FakeDialogue, FakeSynthesizer, FakeTranscriber, harness, harness_with,
    test_config, wait_for_phase, wait_until,
};

/// Two loud frames then sustained quiet: silence confirmation ends the
/// episode and the full turn runs to completion
#[tokio::test(start_paused = true)]
async fn silence_auto_stop_completes_turn() {
    let h = harness(vec![0.5, 0.5, 0.05]);

    assert!(h.controller.start_recording().await.unwrap());
    assert_eq!(h.controller.phase(), Phase::Recording);

    wait_for_phase(&h.controller, Phase::Idle).await;

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hej, hur m\u{e5}r du?");
    assert!(!messages[0].processing);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Jag m\u{e5}r bra, tack!");
    assert_eq!(messages[1].translation.as_deref(), Some("I'm fine, thanks!"));

    assert_eq!(h.transcriber.call_count(), 1);
    assert_eq!(h.dialogue.call_count(), 1);
    assert_eq!(h.synthesizer.call_count(), 1);
    assert_eq!(h.audio.play_count(), 1);
    assert!(h.controller.is_quiescent());
}

/// The turn walks through every phase in order
#[tokio::test(start_paused = true)]
async fn phases_progress_in_order() {
    let mut h = harness(vec![0.5, 0.5, 0.05]);

    h.controller.start_recording().await.unwrap();
    wait_for_phase(&h.controller, Phase::Idle).await;

    let mut observed = vec![];
    while let Ok(event) = h.events.try_recv() {
        if let samtal::SessionEvent::Phase(phase) = event {
            observed.push(phase);
        }
    }

    assert_eq!(
        observed,
        vec![
            Phase::Recording,
            Phase::Transcribing,
            Phase::Thinking,
            Phase::Speaking,
            Phase::Idle,
        ]
    );
}

/// Level events flow to observers while recording
#[tokio::test(start_paused = true)]
async fn level_events_emitted_while_recording() {
    let mut h = harness(vec![0.5, 0.5, 0.05]);

    h.controller.start_recording().await.unwrap();
    wait_for_phase(&h.controller, Phase::Idle).await;

    let mut levels = 0;
    while let Ok(event) = h.events.try_recv() {
        if matches!(event, samtal::SessionEvent::Level(_)) {
            levels += 1;
        }
    }
    assert!(levels > 0, "expected at least one level event");
}

/// A start command is a no-op while already recording
#[tokio::test(start_paused = true)]
async fn start_rejected_while_recording() {
    let h = harness(vec![0.5]);

    assert!(h.controller.start_recording().await.unwrap());
    assert!(!h.controller.start_recording().await.unwrap());
    assert_eq!(h.audio.acquire_count(), 1);
}

/// A start command is a no-op while a processing flag is set
#[tokio::test(start_paused = true)]
async fn start_rejected_while_processing() {
    let (transcriber, gate) = FakeTranscriber::gated("Hej!");
    let h = harness_with(
        vec![0.5],
        transcriber,
        FakeDialogue::ok("Hej!", "Hi!"),
        FakeSynthesizer::ok(),
        test_config(),
    );

    h.controller.start_recording().await.unwrap();
    h.controller.stop_recording();
    wait_for_phase(&h.controller, Phase::Transcribing).await;
    assert!(h.controller.flags().transcribing);

    assert!(!h.controller.start_recording().await.unwrap());
    assert_eq!(h.audio.acquire_count(), 1);

    gate.notify_one();
    wait_for_phase(&h.controller, Phase::Idle).await;

    // Quiescent again: a new episode may begin
    assert!(h.controller.start_recording().await.unwrap());
    assert_eq!(h.audio.acquire_count(), 2);
}

/// An empty transcript apologizes and never reaches the dialogue service
#[tokio::test(start_paused = true)]
async fn empty_transcript_skips_dialogue() {
    let h = harness_with(
        vec![0.5, 0.05],
        FakeTranscriber::ok("   "),
        FakeDialogue::ok("Hej!", "Hi!"),
        FakeSynthesizer::ok(),
        test_config(),
    );

    h.controller.start_recording().await.unwrap();
    wait_for_phase(&h.controller, Phase::Idle).await;

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::Assistant);
    assert!(messages[0].error);
    assert!(messages[0].translation.is_some());

    assert_eq!(h.dialogue.call_count(), 0);
    assert_eq!(h.synthesizer.call_count(), 0);
}

/// Manual stop ends the episode without waiting for silence
#[tokio::test(start_paused = true)]
async fn manual_stop_triggers_pipeline() {
    let h = harness(vec![0.5]);

    assert!(assert_ok!(h.controller.start_recording().await));
    h.controller.stop_recording();
    wait_for_phase(&h.controller, Phase::Idle).await;

    assert_eq!(h.transcriber.call_count(), 1);
    assert_eq!(h.controller.messages().len(), 2);
}

/// A stop command with nothing recording is ignored
#[tokio::test(start_paused = true)]
async fn stop_without_episode_is_noop() {
    let h = harness(vec![0.5]);

    h.controller.stop_recording();
    assert_eq!(h.controller.phase(), Phase::Idle);
    assert!(h.controller.messages().is_empty());
    assert_eq!(h.transcriber.call_count(), 0);
}

/// The second synthesis of the same reply is served from the cache
#[tokio::test(start_paused = true)]
async fn repeated_reply_served_from_cache() {
    let h = harness(vec![0.5]);

    for _ in 0..2 {
        h.controller.start_recording().await.unwrap();
        h.controller.stop_recording();
        wait_for_phase(&h.controller, Phase::Idle).await;
    }

    assert_eq!(h.synthesizer.call_count(), 1);
    assert_eq!(h.audio.play_count(), 2);
    assert_eq!(h.cache.len(), 1);
}

/// A transcription hang is cut off by the deadline and apologized for
#[tokio::test(start_paused = true)]
async fn transcription_timeout_apologizes() {
    let h = harness_with(
        vec![0.5],
        FakeTranscriber::slow("Hej!", Duration::from_secs(60)),
        FakeDialogue::ok("Hej!", "Hi!"),
        FakeSynthesizer::ok(),
        test_config(),
    );

    h.controller.start_recording().await.unwrap();
    h.controller.stop_recording();
    wait_for_phase(&h.controller, Phase::Idle).await;

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].error);
    assert_eq!(h.dialogue.call_count(), 0);
}

/// A failed transcription service apologizes without reaching dialogue
#[tokio::test(start_paused = true)]
async fn transcription_failure_apologizes() {
    let transcriber = FakeTranscriber::ok("unused");
    transcriber.push(Err(Error::Transcription("service down".to_string())));
    let h = harness_with(
        vec![0.5],
        transcriber,
        FakeDialogue::ok("Hej!", "Hi!"),
        FakeSynthesizer::ok(),
        test_config(),
    );

    h.controller.start_recording().await.unwrap();
    h.controller.stop_recording();
    wait_for_phase(&h.controller, Phase::Idle).await;

    assert_eq!(h.dialogue.call_count(), 0);
    let messages = h.controller.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].error);
}

/// A malformed dialogue reply keeps the transcript and apologizes
#[tokio::test(start_paused = true)]
async fn dialogue_failure_keeps_transcript() {
    let h = harness_with(
        vec![0.5],
        FakeTranscriber::ok("Hej d\u{e5}!"),
        FakeDialogue::failing(),
        FakeSynthesizer::ok(),
        test_config(),
    );

    h.controller.start_recording().await.unwrap();
    h.controller.stop_recording();
    wait_for_phase(&h.controller, Phase::Idle).await;

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hej d\u{e5}!");
    assert!(!messages[0].processing);
    assert!(messages[1].error);
    assert_eq!(h.synthesizer.call_count(), 0);
}

/// Synthesis failure skips playback but keeps the assistant text
#[tokio::test(start_paused = true)]
async fn synthesis_failure_is_nonfatal() {
    let h = harness_with(
        vec![0.5],
        FakeTranscriber::ok("Hej!"),
        FakeDialogue::ok("Hej sj\u{e4}lv!", "Hi yourself!"),
        FakeSynthesizer::failing(),
        test_config(),
    );

    h.controller.start_recording().await.unwrap();
    h.controller.stop_recording();
    wait_for_phase(&h.controller, Phase::Idle).await;

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Hej sj\u{e4}lv!");
    assert!(!messages[1].error);
    assert_eq!(h.audio.play_count(), 0);
    assert!(h.controller.is_quiescent());
}

/// Muted playback is skipped; synthesis and caching still run
#[tokio::test(start_paused = true)]
async fn muted_skips_playback() {
    let h = harness(vec![0.5]);
    h.controller.set_muted(true);

    h.controller.start_recording().await.unwrap();
    h.controller.stop_recording();
    wait_for_phase(&h.controller, Phase::Idle).await;

    assert_eq!(h.synthesizer.call_count(), 1);
    assert_eq!(h.cache.len(), 1);
    assert_eq!(h.audio.play_count(), 0);
}

/// Microphone acquisition failure apologizes and stays idle
#[tokio::test(start_paused = true)]
async fn acquisition_failure_apologizes() {
    let audio = FakeAudio::failing();
    let cache = std::sync::Arc::new(samtal::SpeechCache::new(Duration::from_secs(3600), 100));
    let (controller, _events) = samtal::RecordingController::with_receiver(
        test_config(),
        audio,
        FakeTranscriber::ok("Hej!"),
        FakeDialogue::ok("Hej!", "Hi!"),
        FakeSynthesizer::ok(),
        cache,
    );

    let result = controller.start_recording().await;
    assert!(matches!(result, Err(Error::Acquisition(_))));
    assert_eq!(controller.phase(), Phase::Idle);

    let messages = controller.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].error);
}

/// Consecutive turns accumulate an ordered conversation
#[tokio::test(start_paused = true)]
async fn conversation_accumulates_across_turns() {
    let h = harness(vec![0.5]);

    for _ in 0..3 {
        h.controller.start_recording().await.unwrap();
        h.controller.stop_recording();
        wait_for_phase(&h.controller, Phase::Idle).await;
        wait_until("pipeline settled", || h.controller.is_quiescent()).await;
    }

    let messages = h.controller.messages();
    assert_eq!(messages.len(), 6);
    for pair in messages.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
    }
}
