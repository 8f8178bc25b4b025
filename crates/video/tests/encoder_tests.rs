use {
    base::Vec2,
    image::Frame,
    std::{
        path::PathBuf,
        sync::mpsc,
        time::{Duration, Instant},
    },
    video::{
        testing::{Fault, Gate, MemoryBackend, SyntheticSource},
        *,
    },
};

const SIZE: Vec2<usize> = Vec2::new(8, 6);

fn frame(index: usize) -> Frame {
    SyntheticSource::frame(SIZE, index)
}

fn output_path() -> PathBuf {
    PathBuf::from("memory.out")
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out");
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn started(config: EncoderConfig, backend: &MemoryBackend) -> (StreamingEncoder, Completion) {
    let (mut encoder, completion) = StreamingEncoder::new(config, output_path());
    encoder.start(backend).unwrap();
    assert_eq!(encoder.state(), EncoderState::Running);
    (encoder, completion)
}

#[test]
fn test_samples_are_timestamped_in_order() {
    let backend = MemoryBackend::new();
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    for i in 0..4 {
        assert!(encoder.enqueue(&frame(i)).unwrap());
    }
    encoder.stop();
    assert_eq!(completion.blocking_wait(), Ok(output_path()));
    assert_eq!(encoder.state(), EncoderState::Stopped);

    let record = backend.log().snapshot();
    assert_eq!(record.path, Some(output_path()));
    assert_eq!(record.tracks.len(), 1);
    assert_eq!(record.tracks[0].size, SIZE);
    assert_eq!(record.timestamps(), vec![0, 33333, 66667, 100000]);
    for (i, sample) in record.samples.iter().enumerate() {
        assert_eq!(sample.data, image::rgba_to_nv12(&frame(i)).unwrap());
        assert!(sample.flags.key_frame);
        assert!(!sample.flags.codec_config);
    }
}

#[test]
fn test_full_queue_rejects_with_reject_policy() {
    let gate = Gate::closed();
    let backend = MemoryBackend::new().with_gate(gate.clone());
    let config = EncoderConfig::new(SIZE, 30.0)
        .with_queue_capacity(2)
        .with_backpressure(BackpressurePolicy::Reject);
    let (mut encoder, completion) = started(config, &backend);

    assert!(encoder.enqueue(&frame(0)).unwrap());
    // the worker holds frame 0 and waits for an input slot
    wait_for(|| gate.has_stalled());
    assert!(encoder.enqueue(&frame(1)).unwrap());
    assert!(!encoder.enqueue(&frame(2)).unwrap());
    assert!(!encoder.enqueue(&frame(2)).unwrap());
    assert_eq!(encoder.frames_enqueued(), 2);

    gate.release();
    wait_for(|| encoder.enqueue(&frame(2)).unwrap());
    encoder.stop();
    assert!(completion.blocking_wait().is_ok());

    let record = backend.log().snapshot();
    assert_eq!(record.samples.len(), 3);
    assert_eq!(record.samples[2].data, image::rgba_to_nv12(&frame(2)).unwrap());
}

#[test]
fn test_capacity_one_holds_a_single_frame() {
    let gate = Gate::closed();
    let backend = MemoryBackend::new().with_gate(gate.clone());
    let config = EncoderConfig::new(SIZE, 30.0)
        .with_queue_capacity(1)
        .with_backpressure(BackpressurePolicy::Reject);
    let (mut encoder, completion) = started(config, &backend);

    // accepted only once the worker is ready to take it
    wait_for(|| encoder.enqueue(&frame(0)).unwrap());
    wait_for(|| gate.has_stalled());
    assert!(!encoder.enqueue(&frame(1)).unwrap());
    assert_eq!(encoder.frames_enqueued(), 1);

    gate.release();
    wait_for(|| encoder.enqueue(&frame(1)).unwrap());
    encoder.stop();
    assert!(completion.blocking_wait().is_ok());
    assert_eq!(backend.log().snapshot().timestamps(), vec![0, 33333]);
}

#[test]
fn test_third_enqueue_blocks_at_capacity_two() {
    let gate = Gate::closed();
    let backend = MemoryBackend::new().with_gate(gate.clone());
    let config = EncoderConfig::new(SIZE, 30.0).with_queue_capacity(2);
    let (mut encoder, completion) = started(config, &backend);

    assert!(encoder.enqueue(&frame(0)).unwrap());
    wait_for(|| gate.has_stalled());
    assert!(encoder.enqueue(&frame(1)).unwrap());

    let (done_tx, done_rx) = mpsc::channel();
    let producer = std::thread::spawn(move || {
        let accepted = encoder.enqueue(&frame(2)).unwrap();
        done_tx.send(()).unwrap();
        (encoder, accepted)
    });
    std::thread::sleep(Duration::from_millis(200));
    assert!(done_rx.try_recv().is_err(), "third enqueue returned while two frames were pending");

    gate.release();
    done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let (mut encoder, accepted) = producer.join().unwrap();
    assert!(accepted);
    assert_eq!(encoder.frames_enqueued(), 3);
    encoder.stop();
    assert!(completion.blocking_wait().is_ok());
    assert_eq!(backend.log().snapshot().timestamps(), vec![0, 33333, 66667]);
}

#[test]
fn test_stop_twice_releases_once() {
    let backend = MemoryBackend::new();
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    encoder.enqueue(&frame(0)).unwrap();
    encoder.stop();
    encoder.stop();
    assert_eq!(encoder.state(), EncoderState::Stopped);
    assert_eq!(completion.blocking_wait(), Ok(output_path()));

    let record = backend.log().snapshot();
    assert_eq!(record.muxer_stops, 1);
    assert_eq!(record.codec_releases, 1);
    assert_eq!(record.samples.len(), 1);
}

#[test]
fn test_enqueue_after_stop_fails() {
    let backend = MemoryBackend::new();
    let (mut encoder, _completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    encoder.stop();
    assert!(matches!(
        encoder.enqueue(&frame(0)),
        Err(PipelineError::EncodingFailure(_))
    ));
}

#[test]
fn test_wrong_frame_size_is_rejected_without_ending_session() {
    let backend = MemoryBackend::new();
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    let other = Frame::black(Vec2::new(6, 8));
    assert!(matches!(
        encoder.enqueue(&other),
        Err(PipelineError::InvalidFrame(_))
    ));
    assert!(encoder.enqueue(&frame(0)).unwrap());
    encoder.stop();
    assert!(completion.blocking_wait().is_ok());
    assert_eq!(backend.log().snapshot().samples.len(), 1);
}

#[test]
fn test_stop_before_start_fails_session() {
    let (mut encoder, completion) =
        StreamingEncoder::new(EncoderConfig::new(SIZE, 30.0), output_path());
    encoder.stop();
    assert_eq!(encoder.state(), EncoderState::Failed);
    assert!(matches!(
        completion.blocking_wait(),
        Err(PipelineError::EncodingFailure(_))
    ));
}

#[test]
fn test_start_twice_is_rejected() {
    let backend = MemoryBackend::new();
    let (mut encoder, _completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    assert!(matches!(
        encoder.start(&backend),
        Err(PipelineError::ConfigurationFailure(_))
    ));
    encoder.stop();
}

#[test]
fn test_codec_configure_failure() {
    let backend = MemoryBackend::new().with_fault(Fault::Configure);
    let (mut encoder, completion) =
        StreamingEncoder::new(EncoderConfig::new(SIZE, 30.0), output_path());
    let error = encoder.start(&backend).unwrap_err();
    assert!(matches!(error, PipelineError::ConfigurationFailure(_)));
    assert_eq!(encoder.state(), EncoderState::Failed);
    assert_eq!(completion.blocking_wait(), Err(error));

    let record = backend.log().snapshot();
    assert_eq!(record.codec_releases, 1);
    assert_eq!(record.muxer_stops, 0);
    assert_eq!(record.path, None);
}

#[test]
fn test_invalid_config_fails_before_acquiring_anything() {
    let backend = MemoryBackend::new();
    let config = EncoderConfig::new(SIZE, 30.0).with_queue_capacity(0);
    let (mut encoder, completion) = StreamingEncoder::new(config, output_path());
    assert!(matches!(
        encoder.start(&backend),
        Err(PipelineError::ConfigurationFailure(_))
    ));
    assert!(completion.blocking_wait().is_err());
    assert_eq!(backend.log().snapshot().codec_releases, 0);
}

#[test]
fn test_format_change_after_muxer_start_fails() {
    let backend = MemoryBackend::new().with_fault(Fault::RepeatedFormatChange);
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    for i in 0..3 {
        // the worker may already have failed
        let _ = encoder.enqueue(&frame(i));
    }
    encoder.stop();
    match completion.blocking_wait() {
        Err(PipelineError::EncodingFailure(msg)) => assert!(msg.contains("format changed")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(encoder.state(), EncoderState::Failed);
    let record = backend.log().snapshot();
    assert_eq!(record.muxer_stops, 1);
    assert_eq!(record.codec_releases, 1);
}

#[test]
fn test_sample_before_format_change_fails() {
    let backend = MemoryBackend::new().with_fault(Fault::MissingFormatChange);
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    let _ = encoder.enqueue(&frame(0));
    encoder.stop();
    match completion.blocking_wait() {
        Err(PipelineError::EncodingFailure(msg)) => assert!(msg.contains("before the muxer")),
        other => panic!("unexpected outcome {other:?}"),
    }
    let record = backend.log().snapshot();
    assert!(record.samples.is_empty());
    assert!(!record.muxer_started);
    assert_eq!(record.muxer_stops, 1);
}

#[test]
fn test_unexpected_status_is_skipped() {
    let backend = MemoryBackend::new().with_fault(Fault::UnexpectedStatus);
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    for i in 0..3 {
        assert!(encoder.enqueue(&frame(i)).unwrap());
    }
    encoder.stop();
    assert!(completion.blocking_wait().is_ok());
    assert_eq!(backend.log().snapshot().timestamps(), vec![0, 33333, 66667]);
}

#[test]
fn test_abort_reports_cause_and_releases() {
    let backend = MemoryBackend::new();
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    encoder.enqueue(&frame(0)).unwrap();
    encoder.enqueue(&frame(1)).unwrap();
    let cause = PipelineError::InferenceFailure("engine crashed".to_string());
    encoder.abort(cause.clone());
    assert_eq!(encoder.state(), EncoderState::Failed);
    assert_eq!(completion.blocking_wait(), Err(cause));

    // stop after a failure is a no-op
    encoder.stop();
    let record = backend.log().snapshot();
    assert_eq!(record.muxer_stops, 1);
    assert_eq!(record.codec_releases, 1);
}

#[test]
fn test_abort_unblocks_stalled_worker() {
    let gate = Gate::closed();
    let backend = MemoryBackend::new().with_gate(gate.clone());
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    encoder.enqueue(&frame(0)).unwrap();
    wait_for(|| gate.has_stalled());
    encoder.abort(PipelineError::EncodingFailure("cancelled".to_string()));
    assert_eq!(
        completion.blocking_wait(),
        Err(PipelineError::EncodingFailure("cancelled".to_string()))
    );
    assert!(backend.log().snapshot().samples.is_empty());
}

#[test]
fn test_dropping_running_encoder_fails_session() {
    let backend = MemoryBackend::new();
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 30.0), &backend);
    encoder.enqueue(&frame(0)).unwrap();
    drop(encoder);
    assert!(matches!(
        completion.blocking_wait(),
        Err(PipelineError::EncodingFailure(_))
    ));
    let record = backend.log().snapshot();
    assert_eq!(record.muxer_stops, 1);
    assert_eq!(record.codec_releases, 1);
}

#[tokio::test]
async fn test_completion_resolves_asynchronously() {
    let backend = MemoryBackend::new();
    let (mut encoder, completion) = started(EncoderConfig::new(SIZE, 25.0), &backend);
    for i in 0..3 {
        encoder.enqueue(&frame(i)).unwrap();
    }
    encoder.stop();
    assert_eq!(completion.wait().await, Ok(output_path()));
    assert_eq!(backend.log().snapshot().timestamps(), vec![0, 40000, 80000]);
}
