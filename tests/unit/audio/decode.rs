use std::io::Cursor;

use super::*;

fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn wav_bytes(rate: u32, channels: u16, frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut w = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            for c in 0..channels {
                let v = if c == 0 { (i % 100) as i16 * 100 } else { -1000 };
                w.write_sample(v).unwrap();
            }
        }
        w.finalize().unwrap();
    }
    cursor.into_inner()
}

#[test]
fn raw_pcm_round_trip_keeps_sample_count() {
    let samples: Vec<i16> = (0..4800).map(|i| (i as i16).wrapping_mul(7)).collect();
    let decoded = decode(&AudioPayload::RawPcm(pcm_bytes(&samples)), 48_000).unwrap();
    assert_eq!(decoded.sample_rate, RAW_PCM_SAMPLE_RATE);
    assert_eq!(decoded.channel_count(), 1);
    assert_eq!(decoded.frames(), 4800);
    assert!((decoded.duration - 0.2).abs() < 1e-9);
}

#[test]
fn raw_pcm_normalizes_by_32768() {
    let decoded = decode_raw_pcm(&pcm_bytes(&[i16::MIN, 0, 16384, i16::MAX])).unwrap();
    let ch = &decoded.channels[0];
    assert_eq!(ch[0], -1.0);
    assert_eq!(ch[1], 0.0);
    assert_eq!(ch[2], 0.5);
    assert!(ch[3] < 1.0 && ch[3] > 0.999);
}

#[test]
fn raw_pcm_rejects_odd_length_and_empty() {
    assert!(matches!(
        decode_raw_pcm(&[1, 2, 3]),
        Err(ReelError::Decode(_))
    ));
    assert!(matches!(
        decode(&AudioPayload::RawPcm(Vec::new()), 48_000),
        Err(ReelError::Decode(_))
    ));
}

#[test]
fn container_wav_decodes_and_resamples() {
    let bytes = wav_bytes(24_000, 2, 2400);
    let decoded = decode(&AudioPayload::Container(bytes), 48_000).unwrap();
    assert_eq!(decoded.sample_rate, 48_000);
    assert_eq!(decoded.channel_count(), 2);
    assert_eq!(decoded.frames(), 4800);
    assert!((decoded.duration - 0.1).abs() < 1e-6);
    assert!(decoded.channels[1].iter().all(|s| (s + 1000.0 / 32768.0).abs() < 1e-3));
}

#[test]
fn container_garbage_is_decode_error() {
    let err = decode(&AudioPayload::Container(b"not audio at all".to_vec()), 48_000).unwrap_err();
    assert!(matches!(err, ReelError::Decode(_)));
}

#[test]
fn encoded_string_classification() {
    let raw = general_purpose::STANDARD.encode(pcm_bytes(&[1, 2, 3]));
    assert!(matches!(
        AudioPayload::from_encoded_str(&raw).unwrap(),
        AudioPayload::RawPcm(b) if b.len() == 6
    ));

    let wav = wav_bytes(8_000, 1, 8);
    let uri = format!("data:audio/wav;base64,{}", general_purpose::STANDARD.encode(&wav));
    assert_eq!(
        AudioPayload::from_encoded_str(&uri).unwrap(),
        AudioPayload::Container(wav)
    );

    assert!(AudioPayload::from_encoded_str("@@not base64@@").is_err());
}

#[test]
fn path_extension_selects_raw_pcm() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("narration.pcm");
    std::fs::write(&p, pcm_bytes(&[5, 6])).unwrap();
    assert!(matches!(
        AudioPayload::from_path(&p).unwrap(),
        AudioPayload::RawPcm(_)
    ));
    let p = dir.path().join("music.wav");
    std::fs::write(&p, wav_bytes(8_000, 1, 4)).unwrap();
    assert!(matches!(
        AudioPayload::from_reference("music.wav", dir.path()).unwrap(),
        AudioPayload::Container(_)
    ));
}

#[test]
fn reference_accepts_inline_raw_pcm() {
    let dir = tempfile::tempdir().unwrap();
    let inline = general_purpose::STANDARD.encode(pcm_bytes(&[1, -1, 2, -2]));
    let payload = AudioPayload::from_reference(&inline, dir.path()).unwrap();
    assert_eq!(payload, AudioPayload::RawPcm(pcm_bytes(&[1, -1, 2, -2])));
    assert_eq!(decode(&payload, 48_000).unwrap().frames(), 4);

    let err = AudioPayload::from_reference("missing.pcm", dir.path()).unwrap_err();
    assert!(err.to_string().contains("missing.pcm"));
}

#[test]
fn resample_linear_scales_length() {
    let src = vec![0.0, 1.0, 0.0, -1.0];
    assert_eq!(resample_linear(&src, 1000, 1000), src);
    let up = resample_linear(&src, 1000, 2000);
    assert_eq!(up.len(), 8);
    assert!((up[1] - 0.5).abs() < 1e-6);
}
