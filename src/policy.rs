//! # Dialogue Policy
//! Picks the next assistant message from the full conversation history.
//! Nothing is stored between turns: every call re-derives the state from the
//! user-authored turns.
//!
//! The decision is split in two:
//! - [`plan_turn`] is pure (history + reference data + injected RNG) and says
//!   *what* to answer, including which specialties need a practitioner lookup;
//! - [`resolve_plan`] performs those lookups (at most two, run concurrently)
//!   and renders the final [`AssistantReply`].
//!
//! Turn policy, with `n` = number of user turns:
//! - `n = 0`: greeting.
//! - nothing detected in the accumulated text: clarification (first / again).
//! - `n < 3` and the latest turn mentions a symptom with a follow-up question:
//!   ask it.
//! - `n >= 2`: recommend one doctor when the top score beats the runner-up by
//!   more than 1.5×, otherwise offer the top two; no scores → general practitioner.
//! - otherwise: a random general follow-up question.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dialogue_map::{humanize_key, DialogueMap, DoctorProfile};
use crate::error::ResolverError;
use crate::practitioner::{lookup, Practitioner, PractitionerResolver, GENERAL_PRACTITIONER};
use crate::scoring::calculate_doctor_scores;
use crate::symptoms::{detect_symptoms, DetectedSymptom};

/// Top score must exceed runner-up × this to count as a clear winner.
pub const CLEAR_WINNER_MARGIN: f64 = 1.5;
/// Follow-up questions are only asked while fewer user turns than this exist.
pub const FOLLOW_UP_TURN_LIMIT: usize = 3;
/// Recommendations start once this many user turns exist.
pub const RECOMMEND_AFTER_TURNS: usize = 2;
/// Symptom names listed in a recommendation message.
pub const MAX_SYMPTOMS_IN_MESSAGE: usize = 3;

pub const HOSPITAL_AVAILABLE: &str = "Available";
pub const HOSPITAL_SEARCH: &str = "Search for practitioners";

pub const GREETING: &str = "Hello! I'm your health assistant. Please tell me about your symptoms, and I'll help you find the right doctor. What brings you here today?";
pub const CLARIFY_FIRST: &str = "I'd like to help you find the right doctor. Could you describe your symptoms in more detail? For example, are you experiencing any pain, discomfort, or other health concerns?";
pub const CLARIFY_AGAIN: &str = "I'm having trouble identifying specific symptoms. Could you tell me more about what you're feeling? For instance, do you have any pain, fever, nausea, or other symptoms?";
pub const GP_BOOK: &str = "Based on what you've shared, I recommend consulting with a general practitioner who can assess your symptoms and provide appropriate care. Would you like to book an appointment?";
pub const GP_FIND: &str = "Based on what you've shared, I recommend consulting with a general practitioner who can assess your symptoms and provide appropriate care. Would you like me to help you find one?";
pub const TELL_ME_MORE: &str = "Could you tell me more about your symptoms?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    /// Any other author (e.g. "system"); ignored by the policy.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Practitioner attached to a reply. `hospital` is a display label only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PractitionerCard {
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub hospital: String,
}

impl PractitionerCard {
    fn available(p: &Practitioner) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
            specialty: p.specialty.clone(),
            hospital: HOSPITAL_AVAILABLE.to_string(),
        }
    }

    fn reference(d: &DoctorProfile) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            specialty: d.specialty.clone(),
            hospital: HOSPITAL_SEARCH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantReply {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practitioner: Option<PractitionerCard>,
}

impl AssistantReply {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            practitioner: None,
        }
    }
}

/// Which rule produced the reply (for logs and metrics).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Branch {
    Greeting,
    ClarifyFirst,
    ClarifyAgain,
    FollowUp,
    GeneralPractitioner,
    SingleRecommendation,
    TwoOptions,
    GeneralQuestion,
    TellMeMore,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Greeting => "greeting",
            Branch::ClarifyFirst => "clarify_first",
            Branch::ClarifyAgain => "clarify_again",
            Branch::FollowUp => "follow_up",
            Branch::GeneralPractitioner => "general_practitioner",
            Branch::SingleRecommendation => "single_recommendation",
            Branch::TwoOptions => "two_options",
            Branch::GeneralQuestion => "general_question",
            Branch::TellMeMore => "tell_me_more",
        }
    }
}

/// What to answer, before any practitioner lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnAction<'a> {
    Reply {
        branch: Branch,
        reply: AssistantReply,
    },
    GeneralPractitioner,
    Recommend {
        doctor: &'a DoctorProfile,
        symptoms_text: String,
    },
    Compare {
        first: &'a DoctorProfile,
        second: &'a DoctorProfile,
        symptoms_text: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnPlan<'a> {
    pub user_turns: usize,
    /// Symptoms detected over all user turns (empty for the greeting).
    pub detected: Vec<DetectedSymptom>,
    pub action: TurnAction<'a>,
}

impl TurnPlan<'_> {
    pub fn branch(&self) -> Branch {
        match &self.action {
            TurnAction::Reply { branch, .. } => *branch,
            TurnAction::GeneralPractitioner => Branch::GeneralPractitioner,
            TurnAction::Recommend { .. } => Branch::SingleRecommendation,
            TurnAction::Compare { .. } => Branch::TwoOptions,
        }
    }
}

/// User-authored view of a conversation.
#[derive(Debug, Clone)]
pub struct ConversationContext<'t> {
    pub user_messages: Vec<&'t str>,
    /// User turns joined with newlines, so negation never crosses a turn.
    pub all_user_text: String,
}

impl<'t> ConversationContext<'t> {
    pub fn from_turns(turns: &'t [ConversationTurn]) -> Self {
        let user_messages: Vec<&str> = turns
            .iter()
            .filter(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .collect();
        let all_user_text = user_messages.join("\n");
        Self {
            user_messages,
            all_user_text,
        }
    }

    pub fn message_count(&self) -> usize {
        self.user_messages.len()
    }

    pub fn latest(&self) -> &'t str {
        self.user_messages.last().copied().unwrap_or("")
    }
}

fn reply(branch: Branch, message: impl Into<String>) -> TurnAction<'static> {
    TurnAction::Reply {
        branch,
        reply: AssistantReply::text(message),
    }
}

/// Decide the next turn. Pure apart from `rng`, which is only consulted for the
/// general-question fallback.
pub fn plan_turn<'a, R: Rng + ?Sized>(
    turns: &[ConversationTurn],
    map: &'a DialogueMap,
    rng: &mut R,
) -> TurnPlan<'a> {
    let ctx = ConversationContext::from_turns(turns);
    let user_turns = ctx.message_count();

    if user_turns == 0 {
        return TurnPlan {
            user_turns,
            detected: Vec::new(),
            action: reply(Branch::Greeting, GREETING),
        };
    }

    let detected = detect_symptoms(&ctx.all_user_text, map);
    let action = choose_action(&ctx, &detected, map, rng);
    TurnPlan {
        user_turns,
        detected,
        action,
    }
}

fn choose_action<'a, R: Rng + ?Sized>(
    ctx: &ConversationContext<'_>,
    detected: &[DetectedSymptom],
    map: &'a DialogueMap,
    rng: &mut R,
) -> TurnAction<'a> {
    let n = ctx.message_count();

    if detected.is_empty() {
        return if n == 1 {
            reply(Branch::ClarifyFirst, CLARIFY_FIRST)
        } else {
            reply(Branch::ClarifyAgain, CLARIFY_AGAIN)
        };
    }

    // Follow up on whatever the latest message introduced, early on.
    if n < FOLLOW_UP_TURN_LIMIT {
        let recent = detect_symptoms(ctx.latest(), map);
        if let Some(top) = recent.first() {
            let question = map
                .symptom(&top.symptom_key)
                .map(|s| s.follow_up.as_str())
                .unwrap_or("");
            if !question.is_empty() {
                return reply(
                    Branch::FollowUp,
                    format!(
                        "I understand you're experiencing {}. {}",
                        humanize_key(&top.symptom_key),
                        question
                    ),
                );
            }
        }
    }

    if n >= RECOMMEND_AFTER_TURNS {
        let scores = calculate_doctor_scores(detected, &map.doctors);
        let symptoms_text = symptoms_text(detected);
        return match scores.as_slice() {
            [] => TurnAction::GeneralPractitioner,
            [top] => TurnAction::Recommend {
                doctor: top.doctor,
                symptoms_text,
            },
            [top, second, ..] if top.score > second.score * CLEAR_WINNER_MARGIN => {
                TurnAction::Recommend {
                    doctor: top.doctor,
                    symptoms_text,
                }
            }
            [top, second, ..] => TurnAction::Compare {
                first: top.doctor,
                second: second.doctor,
                symptoms_text,
            },
        };
    }

    let pool = map.general_questions();
    if pool.is_empty() {
        return reply(Branch::TellMeMore, TELL_ME_MORE);
    }
    let question = &pool[rng.random_range(0..pool.len())];
    reply(Branch::GeneralQuestion, format!("I see. {question}"))
}

/// First few detected symptom names, humanized and comma-joined.
pub fn symptoms_text(detected: &[DetectedSymptom]) -> String {
    detected
        .iter()
        .take(MAX_SYMPTOMS_IN_MESSAGE)
        .map(|s| humanize_key(&s.symptom_key))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run the lookups the plan needs and render the reply.
pub async fn resolve_plan(
    plan: TurnPlan<'_>,
    resolver: &dyn PractitionerResolver,
) -> Result<AssistantReply, ResolverError> {
    match plan.action {
        TurnAction::Reply { reply, .. } => Ok(reply),

        TurnAction::GeneralPractitioner => {
            let found = lookup(resolver, GENERAL_PRACTITIONER).await?;
            Ok(match found.first() {
                Some(p) => AssistantReply {
                    message: GP_BOOK.to_string(),
                    practitioner: Some(PractitionerCard::available(p)),
                },
                None => AssistantReply::text(GP_FIND),
            })
        }

        TurnAction::Recommend {
            doctor,
            symptoms_text,
        } => {
            let found = lookup(resolver, &doctor.specialty).await?;
            Ok(match found.first() {
                Some(p) => AssistantReply {
                    message: format!(
                        "Based on your symptoms ({symptoms_text}), I recommend **{}**, a {}. {}. They would be well-suited to help you with your concerns. Would you like to book an appointment?",
                        p.name, p.specialty, doctor.description
                    ),
                    practitioner: Some(PractitionerCard::available(p)),
                },
                None => AssistantReply {
                    message: format!(
                        "Based on your symptoms ({symptoms_text}), I recommend **{}**, a {}. {}. They would be well-suited to help you with your concerns. Would you like to find a practitioner?",
                        doctor.name, doctor.specialty, doctor.description
                    ),
                    practitioner: Some(PractitionerCard::reference(doctor)),
                },
            })
        }

        TurnAction::Compare {
            first,
            second,
            symptoms_text,
        } => {
            let (found_first, found_second) = tokio::try_join!(
                lookup(resolver, &first.specialty),
                lookup(resolver, &second.specialty),
            )?;

            let mut message = format!(
                "Based on your symptoms ({symptoms_text}), I'd recommend consulting with either:\n\n"
            );
            message.push_str(&option_line(1, first, found_first.first()));
            message.push_str(&option_line(2, second, found_second.first()));
            message.push_str("Would you like to book with one of them?");

            let practitioner = match found_first.first() {
                Some(p) => PractitionerCard::available(p),
                None => PractitionerCard::reference(first),
            };
            Ok(AssistantReply {
                message,
                practitioner: Some(practitioner),
            })
        }
    }
}

fn option_line(n: usize, doctor: &DoctorProfile, real: Option<&Practitioner>) -> String {
    let (name, specialty) = match real {
        Some(p) => (p.name.as_str(), p.specialty.as_str()),
        None => (doctor.name.as_str(), doctor.specialty.as_str()),
    };
    format!(
        "{n}. **{name}** - {specialty}\n   {}\n\n",
        doctor.description
    )
}

/// Plan and resolve in one call.
pub async fn respond<R: Rng + ?Sized>(
    turns: &[ConversationTurn],
    map: &DialogueMap,
    resolver: &dyn PractitionerResolver,
    rng: &mut R,
) -> Result<AssistantReply, ResolverError> {
    let plan = plan_turn(turns, map, rng);
    resolve_plan(plan, resolver).await
}
