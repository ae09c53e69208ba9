use mtcsyncrs::mtc::{DecoderEvent, FullFrameBehavior, MessageKind, MtcDecoder, MtcEncoder};
use mtcsyncrs::timecode::{Components, FrameRate, Timecode};
use std::sync::{Arc, Mutex};

fn recording_encoder(rate: FrameRate) -> (MtcEncoder, Arc<Mutex<Vec<Vec<u8>>>>) {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let sink = sent.clone();
    let mut encoder = MtcEncoder::new(rate);
    encoder.set_midi_out_handler(Box::new(move |bytes| sink.lock().unwrap().push(bytes.to_vec())));
    (encoder, sent)
}

fn decode_all(decoder: &mut MtcDecoder, messages: &[Vec<u8>]) -> Vec<(Timecode, MessageKind)> {
    messages
        .iter()
        .filter_map(|bytes| match decoder.midi_in(bytes) {
            Some(DecoderEvent::TimecodeChanged(change)) => Some((change.timecode, change.kind)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_two_groups_forward_at_25() {
    let (mut encoder, sent) = recording_encoder(FrameRate::Fps25);
    encoder
        .locate(
            &Timecode::parse("01:00:00:00", FrameRate::Fps25).unwrap(),
            FullFrameBehavior::Always,
        )
        .unwrap();
    for _ in 0..16 {
        encoder.increment();
    }

    let messages = sent.lock().unwrap().clone();
    assert_eq!(messages.len(), 17);

    let mut decoder = MtcDecoder::new(Some(FrameRate::Fps25));
    let positions = decode_all(&mut decoder, &messages);

    assert_eq!(positions[0].1, MessageKind::FullFrame);
    assert_eq!(positions[0].0.to_string(), "01:00:00:00");
    // first quarter-frame position once the group completes
    assert_eq!(positions[1].0.to_string(), "01:00:00:02");

    let quarter_frames: Vec<Timecode> = positions[1..].iter().map(|(tc, _)| *tc).collect();
    assert!(quarter_frames
        .windows(2)
        .all(|pair| pair[0].total_frames() <= pair[1].total_frames()));
    assert_eq!(quarter_frames.last().unwrap().to_string(), "01:00:00:04");
}

#[test]
fn test_drop_frame_minute_boundary() {
    let (mut encoder, sent) = recording_encoder(FrameRate::Fps29_97Drop);
    encoder
        .locate(
            &Timecode::parse("00:00:59;26", FrameRate::Fps29_97Drop).unwrap(),
            FullFrameBehavior::Never,
        )
        .unwrap();
    for _ in 0..16 {
        encoder.increment();
    }

    let messages = sent.lock().unwrap().clone();
    let mut decoder = MtcDecoder::new(None);
    let positions = decode_all(&mut decoder, &messages);

    assert_eq!(positions[0].0.components(), Components::new(0, 0, 59, 28));
    let last = positions.last().unwrap().0;
    assert_eq!(last.frame_rate(), FrameRate::Fps29_97Drop);
    // ;00 and ;01 do not exist at minute 1
    assert_eq!(last.components(), Components::new(0, 1, 0, 2));
}

#[test]
fn test_backward_stream_reports_backward() {
    let (mut encoder, sent) = recording_encoder(FrameRate::Fps30);
    encoder
        .locate(
            &Timecode::parse("00:10:00:10", FrameRate::Fps30).unwrap(),
            FullFrameBehavior::Never,
        )
        .unwrap();
    for _ in 0..24 {
        encoder.decrement();
    }

    let messages = sent.lock().unwrap().clone();
    let mut decoder = MtcDecoder::new(Some(FrameRate::Fps30));
    let positions = decode_all(&mut decoder, &messages);

    assert!(!positions.is_empty());
    assert_eq!(decoder.direction(), mtcsyncrs::mtc::Direction::Backward);
    let frames: Vec<i64> = positions.iter().map(|(tc, _)| tc.total_frames()).collect();
    assert!(frames.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[test]
fn test_scaled_rate_is_reported_locally() {
    let (mut encoder, sent) = recording_encoder(FrameRate::Fps50);
    encoder
        .locate(
            &Timecode::parse("00:00:01:00", FrameRate::Fps50).unwrap(),
            FullFrameBehavior::Always,
        )
        .unwrap();
    for _ in 0..8 {
        encoder.increment();
    }

    let messages = sent.lock().unwrap().clone();
    let mut decoder = MtcDecoder::new(Some(FrameRate::Fps50));
    let positions = decode_all(&mut decoder, &messages);

    assert!(positions
        .iter()
        .all(|(tc, _)| tc.frame_rate() == FrameRate::Fps50));
    // group of 25 fps frame 0 completed forward: two MTC frames, four local frames
    assert_eq!(positions.last().unwrap().0.to_string(), "00:00:01:04");
}

#[test]
fn test_incompatible_local_rate_is_reported() {
    let (mut encoder, sent) = recording_encoder(FrameRate::Fps24);
    encoder
        .locate(&Timecode::zero(FrameRate::Fps24), FullFrameBehavior::Always)
        .unwrap();

    let messages = sent.lock().unwrap().clone();
    let mut decoder = MtcDecoder::new(Some(FrameRate::Fps25));
    assert!(matches!(
        decoder.midi_in(&messages[0]),
        Some(DecoderEvent::IncompatibleFrameRate {
            kind: MessageKind::FullFrame,
            ..
        })
    ));
}
