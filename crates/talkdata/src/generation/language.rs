//! Script-based language detection for answer framing

/// Language the answer should be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerLanguage {
    /// Arabic-script question with Urdu-only letters, answered in Urdu
    Urdu,
    /// Predominantly ASCII-letter question
    English,
    /// Anything else: answer in the question's own script
    SameAsQuestion,
}

impl AnswerLanguage {
    /// Classify a question by the scripts of its letters
    pub fn detect(text: &str) -> Self {
        let mut latin = 0usize;
        let mut arabic = 0usize;
        let mut other = 0usize;
        let mut urdu_only = false;

        for c in text.chars().filter(|c| c.is_alphabetic()) {
            if c.is_ascii_alphabetic() {
                latin += 1;
            } else if is_arabic_script(c) {
                arabic += 1;
                urdu_only |= is_urdu_letter(c);
            } else {
                other += 1;
            }
        }

        let letters = latin + arabic + other;
        if letters == 0 {
            return Self::SameAsQuestion;
        }
        // Arabic and Persian questions are answered in their own script
        if urdu_only && arabic >= latin && arabic >= other {
            return Self::Urdu;
        }
        // at least 80% ASCII letters
        if latin * 5 >= letters * 4 {
            return Self::English;
        }
        Self::SameAsQuestion
    }

    /// Instruction appended to the question in the prompt
    pub fn instruction(&self) -> &'static str {
        match self {
            Self::Urdu => "جواب اردو میں دیں۔",
            Self::English => "Answer in English. Use bullets or numbered format where appropriate.",
            Self::SameAsQuestion => "Answer in the same script and tone.",
        }
    }
}

fn is_arabic_script(c: char) -> bool {
    matches!(c,
        '\u{0600}'..='\u{06FF}'
        | '\u{0750}'..='\u{077F}'
        | '\u{08A0}'..='\u{08FF}'
        | '\u{FB50}'..='\u{FDFF}'
        | '\u{FE70}'..='\u{FEFF}')
}

/// Letters Urdu uses and Arabic or Persian do not
///
/// Farsi yeh (U+06CC) is shared with Persian, so it does not count.
fn is_urdu_letter(c: char) -> bool {
    matches!(
        c,
        '\u{0679}' // tteh
            | '\u{0688}' // ddal
            | '\u{0691}' // rreh
            | '\u{06BA}' // noon ghunna
            | '\u{06C1}' // heh goal
            | '\u{06C3}' // teh marbuta goal
            | '\u{06D2}' // yeh barree
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect() {
        assert_eq!(AnswerLanguage::detect("What does Bob like?"), AnswerLanguage::English);
        assert_eq!(AnswerLanguage::detect("باب کو کیا پسند ہے؟"), AnswerLanguage::Urdu);
        assert_eq!(AnswerLanguage::detect("Что любит Боб?"), AnswerLanguage::SameAsQuestion);
        assert_eq!(AnswerLanguage::detect("1234?"), AnswerLanguage::SameAsQuestion);
    }

    #[test]
    fn test_arabic_and_persian_are_not_urdu() {
        assert_eq!(AnswerLanguage::detect("ما هو لون السماء؟"), AnswerLanguage::SameAsQuestion);
        assert_eq!(AnswerLanguage::detect("آسمان چه رنگی است؟"), AnswerLanguage::SameAsQuestion);
        assert_eq!(AnswerLanguage::detect("یہ کیا ہے"), AnswerLanguage::Urdu);
    }

    #[test]
    fn test_mixed_script_leans_on_majority() {
        assert_eq!(AnswerLanguage::detect("PDF میں کیا لکھا ہے"), AnswerLanguage::Urdu);
        assert_eq!(AnswerLanguage::detect("Summarize the café menu"), AnswerLanguage::English);
    }
}
