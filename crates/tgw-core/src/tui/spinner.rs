const BRAILLE_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Running cells alternate between a full and a hollow block.
const PULSE_FRAMES: &[char] = &['█', '█', '█', '▓', '▒', '░', '▒', '▓', '█', '█'];

pub fn frame(idx: usize) -> char {
    BRAILLE_FRAMES[idx % BRAILLE_FRAMES.len()]
}

pub fn pulse(idx: usize) -> char {
    PULSE_FRAMES[idx % PULSE_FRAMES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_is_braille() {
        for &ch in BRAILLE_FRAMES {
            assert!(('\u{2800}'..='\u{28FF}').contains(&ch), "char {ch:?} not in Braille range");
        }
    }

    #[test]
    fn frames_wrap() {
        assert_eq!(frame(0), frame(BRAILLE_FRAMES.len()));
        assert_eq!(pulse(3), pulse(3 + PULSE_FRAMES.len()));
        let _ = frame(usize::MAX);
        let _ = pulse(usize::MAX);
    }

    #[test]
    fn pulse_matches_spinner_period() {
        assert_eq!(PULSE_FRAMES.len(), crate::app::SPINNER_FRAME_COUNT);
    }
}
