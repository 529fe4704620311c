//! Quality and engagement metrics
//!
//! `finalize_metrics` is a pure function of the response list and the guide,
//! so running it twice yields identical numbers.

use interview_agent_config::InterviewConfig;
use interview_agent_core::{
    CallGuide, EngagementMetrics, InterestSignal, Interview, QualityMetrics,
};

/// Average answer length, in words, that earns the full length share
const TARGET_RESPONSE_WORDS: f64 = 30.0;
/// Completion that earns the full completion share
const TARGET_COMPLETION: f64 = 0.7;

const LENGTH_WEIGHT: f64 = 0.4;
const COMPLETION_WEIGHT: f64 = 0.3;
const FOLLOW_UP_WEIGHT: f64 = 0.3;

pub fn finalize_metrics(interview: &mut Interview, guide: &CallGuide) {
    interview.quality_metrics = quality_metrics(interview, guide);
    interview.engagement_metrics =
        engagement_metrics(interview, interview.quality_metrics.completion_percentage);

    tracing::info!(
        interview_id = %interview.interview_id,
        completion = interview.quality_metrics.completion_percentage,
        engagement = interview.engagement_metrics.overall_engagement,
        "Final metrics"
    );
}

fn quality_metrics(interview: &Interview, guide: &CallGuide) -> QualityMetrics {
    let total_questions = guide.total_questions();
    let questions_asked = interview.primary_responses().count();
    let questions_answered = interview
        .primary_responses()
        .filter(|r| r.is_answered())
        .count();
    let follow_ups_generated = interview.follow_up_responses().count();

    let completion_percentage = ratio(questions_answered, total_questions).min(1.0);
    let guide_adherence = ratio(questions_asked, total_questions).min(1.0);

    let densities: Vec<f64> = interview
        .responses
        .iter()
        .filter(|r| r.is_answered())
        .filter_map(|r| r.information_density)
        .map(f64::from)
        .collect();
    let insight_yield = mean(&densities);

    let technical_quality_score = if interview.responses.is_empty() {
        0.0
    } else {
        ratio(
            interview.responses.iter().filter(|r| r.is_answered()).count(),
            interview.responses.len(),
        )
    };

    QualityMetrics {
        completion_percentage,
        total_questions,
        questions_asked,
        questions_answered,
        follow_ups_generated,
        insight_yield,
        guide_adherence,
        technical_quality_score,
        stt_accuracy: None,
    }
}

fn engagement_metrics(interview: &Interview, completion: f64) -> EngagementMetrics {
    let responses = &interview.responses;

    let lengths: Vec<f64> = responses
        .iter()
        .filter(|r| r.is_answered())
        .map(|r| r.word_count() as f64)
        .collect();
    let avg_response_length = mean(&lengths);

    let times: Vec<f64> = responses
        .iter()
        .map(|r| r.response_time_seconds)
        .filter(|t| *t > 0.0)
        .collect();
    let avg_response_time = mean(&times);

    let enthusiastic = responses
        .iter()
        .filter(|r| r.has_signal(InterestSignal::Enthusiasm.as_str()))
        .count();
    let enthusiasm_score = ratio(enthusiastic, responses.len());
    let hesitation_count = responses
        .iter()
        .filter(|r| r.has_signal(InterestSignal::Hesitation.as_str()))
        .count();
    let silence_count = responses.iter().filter(|r| !r.is_answered()).count();

    let has_follow_ups = responses.iter().any(|r| r.is_follow_up);
    let overall_engagement = (LENGTH_WEIGHT * (avg_response_length / TARGET_RESPONSE_WORDS).min(1.0)
        + COMPLETION_WEIGHT * (completion / TARGET_COMPLETION).min(1.0)
        + if has_follow_ups { FOLLOW_UP_WEIGHT } else { 0.0 })
    .min(1.0);

    EngagementMetrics {
        avg_response_length,
        avg_response_time,
        enthusiasm_score,
        hesitation_count,
        interruption_count: interview.engagement_metrics.interruption_count,
        silence_count,
        overall_engagement,
    }
}

/// Reason to flag a finished interview for human review, if any.
///
/// Reads the finalized metrics, so call it after [`finalize_metrics`].
/// `provider_errors` counts speech, audio and model failures during the run.
pub fn quality_escalation(
    interview: &Interview,
    provider_errors: usize,
    config: &InterviewConfig,
) -> Option<String> {
    let completion = interview.quality_metrics.completion_percentage;
    if completion < config.escalation_min_completion {
        return Some(format!(
            "Quality below threshold: completion {:.2} < {:.2}",
            completion, config.escalation_min_completion
        ));
    }

    let engagement = interview.engagement_metrics.overall_engagement;
    if engagement < config.escalation_min_engagement {
        return Some(format!(
            "Quality below threshold: engagement {:.2} < {:.2}",
            engagement, config.escalation_min_engagement
        ));
    }

    let error_rate = ratio(provider_errors, interview.responses.len().max(1));
    if error_rate > config.escalation_max_error_rate {
        return Some(format!(
            "Quality below threshold: error rate {:.2} > {:.2}",
            error_rate, config.escalation_max_error_rate
        ));
    }

    None
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
