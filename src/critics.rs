use rand::seq::SliceRandom;
use rand::Rng;

use crate::state::Review;

const FIVE_STARS: [&str; 3] = [
    "A Tour de Force Performance!",
    "Breathtaking Keyboard Mastery!",
    "Standing Ovation Worthy!",
];
const FOUR_STARS: [&str; 3] = [
    "A Compelling Performance",
    "Shows Great Promise",
    "Nearly Steals the Show",
];
const THREE_STARS: [&str; 3] = ["Room to Grow", "Finding Their Voice", "Work in Progress"];
const TWO_STARS: [&str; 3] = [
    "Rough Around the Edges",
    "Needs More Rehearsal",
    "Early Days Yet",
];
const ONE_STAR: [&str; 3] = [
    "Keep Practicing",
    "The Journey Begins",
    "Every Star Starts Somewhere",
];

/// Byline printed under every notice.
pub const PUBLICATION: &str = "The Daily Typist";

pub fn headlines(stars: u8) -> &'static [&'static str] {
    match stars {
        5 => &FIVE_STARS,
        4 => &FOUR_STARS,
        3 => &THREE_STARS,
        2 => &TWO_STARS,
        _ => &ONE_STAR,
    }
}

/// The body of a notice. Long streaks earn a mention in the better bands.
pub fn review_text(accuracy: f64, tempo: f64, streak: u32) -> String {
    let tempo = tempo.round();
    let accuracy_pct = accuracy.round();
    if accuracy >= 95.0 {
        let mut text = format!(
            "An absolutely captivating {tempo} WPM performance with {accuracy_pct}% precision. \
             The audience was mesmerized by the flawless execution and commanding stage presence."
        );
        if streak > 50 {
            text.push_str(&format!(
                " A remarkable {streak}-keystroke streak shows true mastery!"
            ));
        }
        text
    } else if accuracy >= 85.0 {
        let coda = if streak > 30 {
            format!("The {streak}-keystroke streak demonstrates improving muscle memory.")
        } else {
            "Keep building that confidence!".to_string()
        };
        format!(
            "With {tempo} WPM and {accuracy_pct}% accuracy, this performance shows solid \
             technique and growing confidence. {coda}"
        )
    } else if accuracy >= 70.0 {
        let coda = if streak > 20 {
            format!("Moments of brilliance in that {streak}-keystroke run!")
        } else {
            "Trust those stage directions and the spotlight will find you.".to_string()
        };
        format!(
            "At {tempo} WPM with {accuracy_pct}% accuracy, there's clear potential waiting \
             to be unlocked. {coda}"
        )
    } else {
        format!(
            "Every great performer starts somewhere. At {tempo} WPM, the dedication is \
             evident. Focus on accuracy over speed, and remember: the stage directions are \
             your friend!"
        )
    }
}

/// A review as the critics print it.
#[derive(Debug, Clone, PartialEq)]
pub struct Critique {
    pub review: Review,
    pub headline: &'static str,
    pub text: String,
}

impl Critique {
    /// `streak` is the no-look streak the exercise ended on.
    pub fn write<R: Rng + ?Sized>(review: Review, streak: u32, rng: &mut R) -> Self {
        let headline = headlines(review.stars)
            .choose(rng)
            .copied()
            .unwrap_or(ONE_STAR[0]);
        let text = review_text(review.accuracy, review.tempo, streak);
        Self {
            review,
            headline,
            text,
        }
    }
}
