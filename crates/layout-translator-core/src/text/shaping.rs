//! Display preparation for right-to-left scripts.
//!
//! PDF content streams draw glyphs left to right in the order given, with no
//! shaping engine in between. Arabic-script text therefore has to be turned
//! into contextual presentation forms and put into visual order before it is
//! written out.

use unicode_bidi::{BidiInfo, Level};

use crate::config::Lang;

const TATWEEL: char = '\u{0640}';
const LAM: char = '\u{0644}';

/// How a letter connects to its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Joining {
    /// Connects on both sides (isolated, final, initial, medial forms)
    Dual,
    /// Connects to the preceding letter only (isolated, final forms)
    Right,
    /// Never connects (isolated form only)
    Isolated,
}

/// Isolated presentation form and joining class of an Arabic letter.
///
/// The remaining forms follow the isolated one: final at +1, and for
/// dual-joining letters initial at +2 and medial at +3.
const fn letter(c: char) -> Option<(u32, Joining)> {
    use Joining::{Dual, Isolated, Right};
    let entry = match c {
        '\u{0621}' => (0xFE80, Isolated),
        '\u{0622}' => (0xFE81, Right),
        '\u{0623}' => (0xFE83, Right),
        '\u{0624}' => (0xFE85, Right),
        '\u{0625}' => (0xFE87, Right),
        '\u{0626}' => (0xFE89, Dual),
        '\u{0627}' => (0xFE8D, Right),
        '\u{0628}' => (0xFE8F, Dual),
        '\u{0629}' => (0xFE93, Right),
        '\u{062A}' => (0xFE95, Dual),
        '\u{062B}' => (0xFE99, Dual),
        '\u{062C}' => (0xFE9D, Dual),
        '\u{062D}' => (0xFEA1, Dual),
        '\u{062E}' => (0xFEA5, Dual),
        '\u{062F}' => (0xFEA9, Right),
        '\u{0630}' => (0xFEAB, Right),
        '\u{0631}' => (0xFEAD, Right),
        '\u{0632}' => (0xFEAF, Right),
        '\u{0633}' => (0xFEB1, Dual),
        '\u{0634}' => (0xFEB5, Dual),
        '\u{0635}' => (0xFEB9, Dual),
        '\u{0636}' => (0xFEBD, Dual),
        '\u{0637}' => (0xFEC1, Dual),
        '\u{0638}' => (0xFEC5, Dual),
        '\u{0639}' => (0xFEC9, Dual),
        '\u{063A}' => (0xFECD, Dual),
        '\u{0641}' => (0xFED1, Dual),
        '\u{0642}' => (0xFED5, Dual),
        '\u{0643}' => (0xFED9, Dual),
        '\u{0644}' => (0xFEDD, Dual),
        '\u{0645}' => (0xFEE1, Dual),
        '\u{0646}' => (0xFEE5, Dual),
        '\u{0647}' => (0xFEE9, Dual),
        '\u{0648}' => (0xFEED, Right),
        '\u{0649}' => (0xFEEF, Right),
        '\u{064A}' => (0xFEF1, Dual),
        '\u{0671}' => (0xFB50, Right),
        // Persian
        '\u{067E}' => (0xFB56, Dual),
        '\u{0686}' => (0xFB7A, Dual),
        '\u{0698}' => (0xFB8A, Right),
        '\u{06A9}' => (0xFB8E, Dual),
        '\u{06AF}' => (0xFB92, Dual),
        '\u{06CC}' => (0xFBFC, Dual),
        // Urdu
        '\u{0679}' => (0xFB66, Dual),
        '\u{0688}' => (0xFB88, Right),
        '\u{0691}' => (0xFB8C, Right),
        '\u{06BA}' => (0xFB9E, Dual),
        '\u{06BB}' => (0xFBA0, Dual),
        '\u{06BE}' => (0xFBAA, Dual),
        '\u{06C0}' => (0xFBA4, Right),
        '\u{06C1}' => (0xFBA6, Dual),
        '\u{06D2}' => (0xFBAE, Right),
        '\u{06D3}' => (0xFBB0, Right),
        _ => return None,
    };
    Some(entry)
}

/// Forms (isolated, final, initial, medial) of letters whose presentation
/// forms are not contiguous.
const fn irregular(c: char) -> Option<[u32; 4]> {
    match c {
        // Noon ghunna has no initial or medial forms of its own
        '\u{06BA}' => Some([0xFB9E, 0xFB9F, 0xFEE7, 0xFEE8]),
        _ => None,
    }
}

/// Lam-alef ligature (isolated, final) for the alef that follows a lam.
const fn lam_alef(alef: char) -> Option<(u32, u32)> {
    match alef {
        '\u{0622}' => Some((0xFEF5, 0xFEF6)),
        '\u{0623}' => Some((0xFEF7, 0xFEF8)),
        '\u{0625}' => Some((0xFEF9, 0xFEFA)),
        '\u{0627}' => Some((0xFEFB, 0xFEFC)),
        _ => None,
    }
}

/// Combining marks that do not interrupt joining.
const fn is_transparent(c: char) -> bool {
    matches!(c, '\u{064B}'..='\u{065F}' | '\u{0670}')
}

fn joins_forward(c: char) -> bool {
    c == TATWEEL || matches!(letter(c), Some((_, Joining::Dual)))
}

fn joins_backward(c: char) -> bool {
    c == TATWEEL || matches!(letter(c), Some((_, Joining::Dual | Joining::Right)))
}

fn form(code: u32) -> char {
    char::from_u32(code).unwrap_or('\u{FFFD}')
}

/// Replace Arabic letters with their contextual presentation forms.
///
/// Input and output are both in logical order. Characters outside the
/// Arabic letter table pass through unchanged.
pub fn reshape_arabic(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());

    // Nearest non-transparent neighbour in each direction
    let prev_base = |i: usize| chars[..i].iter().rev().copied().find(|c| !is_transparent(*c));
    let next_base = |i: usize| chars[i + 1..].iter().copied().find(|c| !is_transparent(*c));

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let Some((iso, joining)) = letter(c) else {
            out.push(c);
            i += 1;
            continue;
        };

        let connects_prev =
            joining != Joining::Isolated && prev_base(i).is_some_and(joins_forward);

        if c == LAM
            && let Some(j) = (i + 1..chars.len()).find(|&j| !is_transparent(chars[j]))
            && let Some((isolated, final_form)) = lam_alef(chars[j])
        {
            out.push(form(if connects_prev { final_form } else { isolated }));
            // Marks between lam and alef follow the ligature
            out.extend(&chars[i + 1..j]);
            i = j + 1;
            continue;
        }

        let connects_next = joining == Joining::Dual && next_base(i).is_some_and(joins_backward);

        let offset = match (connects_prev, connects_next) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        };
        let forms = irregular(c).unwrap_or([iso, iso + 1, iso + 2, iso + 3]);
        out.push(form(forms[offset]));
        i += 1;
    }

    out
}

/// Reorder a single line from logical to visual order with the Unicode
/// bidirectional algorithm, using a right-to-left paragraph direction.
pub fn reorder_visual(line: &str) -> String {
    let bidi = BidiInfo::new(line, Some(Level::rtl()));
    let mut out = String::with_capacity(line.len());
    for para in &bidi.paragraphs {
        out.push_str(&bidi.reorder_line(para, para.range.clone()));
    }
    out
}

/// Prepare one rendered line for drawing in `lang`.
///
/// Right-to-left languages are reshaped and then reordered; everything else
/// is returned as-is.
pub fn prepare_for_display(line: &str, lang: &Lang) -> String {
    if lang.is_rtl() {
        reorder_visual(&reshape_arabic(line))
    } else {
        line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_forms() {
        // beh beh beh: initial, medial, final
        assert_eq!(reshape_arabic("ببب"), "\u{FE91}\u{FE92}\u{FE90}");
        // beh alone
        assert_eq!(reshape_arabic("ب"), "\u{FE8F}");
        // beh alef: alef takes the final form
        assert_eq!(reshape_arabic("با"), "\u{FE91}\u{FE8E}");
    }

    #[test]
    fn test_right_joining_letter_breaks_the_chain() {
        // dal never connects forward, so the beh after it is isolated
        assert_eq!(reshape_arabic("دب"), "\u{FEA9}\u{FE8F}");
    }

    #[test]
    fn test_lam_alef_ligature() {
        // seen + lam-alef + meem
        assert_eq!(reshape_arabic("سلام"), "\u{FEB3}\u{FEFC}\u{FEE1}");
        assert_eq!(reshape_arabic("لا"), "\u{FEFB}");
        assert_eq!(reshape_arabic("لأ"), "\u{FEF7}");
    }

    #[test]
    fn test_lam_alef_ligature_across_harakat() {
        assert_eq!(reshape_arabic("لَا"), "\u{FEFB}\u{064E}");
        assert_eq!(reshape_arabic("سلَام"), "\u{FEB3}\u{FEFC}\u{064E}\u{FEE1}");
        // A mark on the alef itself stays after it
        assert_eq!(reshape_arabic("لاً"), "\u{FEFB}\u{064B}");
    }

    #[test]
    fn test_harakat_are_transparent() {
        assert_eq!(reshape_arabic("بَب"), "\u{FE91}\u{064E}\u{FE90}");
    }

    #[test]
    fn test_persian_letters() {
        // peh + yeh: initial + final
        assert_eq!(reshape_arabic("پی"), "\u{FB58}\u{FBFD}");
    }

    #[test]
    fn test_urdu_letters() {
        // tteh + yeh barree
        assert_eq!(reshape_arabic("ٹے"), "\u{FB68}\u{FBAF}");
        // heh goal + waw + noon ghunna
        assert_eq!(reshape_arabic("ہوں"), "\u{FBA8}\u{FEEE}\u{FB9E}");
        // meem + farsi yeh + noon ghunna final
        assert_eq!(reshape_arabic("میں"), "\u{FEE3}\u{FBFF}\u{FB9F}");
        // beh + rreh + alef: rreh never connects forward
        assert_eq!(reshape_arabic("بڑا"), "\u{FE91}\u{FB8D}\u{FE8D}");
        // ddal + heh doachashmee
        assert_eq!(reshape_arabic("ڈھ"), "\u{FB88}\u{FBAA}");
    }

    #[test]
    fn test_urdu_display_line() {
        let visual = prepare_for_display("ٹے", &Lang::new("ur"));
        assert_eq!(visual, "\u{FBAF}\u{FB68}");
    }

    #[test]
    fn test_non_arabic_passes_through() {
        assert_eq!(reshape_arabic("Hello, world 123"), "Hello, world 123");
        assert_eq!(reshape_arabic("שלום"), "שלום");
    }

    #[test]
    fn test_rtl_reordering() {
        let shaped = prepare_for_display("بب", &Lang::new("ar"));
        assert_eq!(shaped, "\u{FE90}\u{FE91}");

        let hebrew = prepare_for_display("שלום", &Lang::new("he"));
        assert_eq!(hebrew, "םולש");
    }

    #[test]
    fn test_mixed_direction_line() {
        let visual = prepare_for_display("مرحبا ABC", &Lang::new("ar"));
        assert_eq!(
            visual,
            "ABC \u{FE8E}\u{FE92}\u{FEA3}\u{FEAE}\u{FEE3}"
        );
    }

    #[test]
    fn test_ltr_target_is_untouched() {
        let text = "مرحبا ABC";
        assert_eq!(prepare_for_display(text, &Lang::new("fr")), text);
    }
}
