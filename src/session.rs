//! Quiz session state machine.
//!
//! A [`Session`] walks one task's questions: it shuffles each question when it
//! is shown, records exactly one answer per question and aggregates the score
//! once every question has been answered. No session exists while the user is
//! choosing a task, which is the idle state.

use std::fmt;
use std::sync::Arc;

use rand::Rng;
use uuid::Uuid;

use crate::bank::question::{Question, QuestionId, TaskId};
use crate::bank::RetrieveTasks;
use crate::error::QuizError;
use crate::shuffle::ShuffleRecord;

/// Optional behaviour of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizPolicy {
    pub shuffle_options: bool,
    pub allow_back: bool,
}

impl Default for QuizPolicy {
    fn default() -> Self {
        Self {
            shuffle_options: true,
            allow_back: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Answering,
    Feedback,
    Finished,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Answering => "answering",
            Phase::Feedback => "showing feedback",
            Phase::Finished => "finished",
        })
    }
}

/// One answered question, frozen at the moment of answering.
///
/// Choice indices are positions in `displayed_options`; `mapping` leads back
/// to the bank order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    question_id: QuestionId,
    question_text: String,
    user_choice: usize,
    correct_choice: usize,
    is_correct: bool,
    displayed_options: Vec<String>,
    explanation: String,
    mapping: Vec<usize>,
}

impl AnswerRecord {
    fn new(question: &Question, shuffle: &ShuffleRecord, user_choice: usize) -> Self {
        let correct_choice = shuffle.shuffled_correct();
        Self {
            question_id: question.id().clone(),
            question_text: question.text().to_owned(),
            user_choice,
            correct_choice,
            is_correct: user_choice == correct_choice,
            displayed_options: shuffle.apply(question.options()),
            explanation: question.explanation().to_owned(),
            mapping: shuffle.mapping().to_vec(),
        }
    }

    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    pub fn question_text(&self) -> &str {
        &self.question_text
    }

    pub fn user_choice(&self) -> usize {
        self.user_choice
    }

    pub fn correct_choice(&self) -> usize {
        self.correct_choice
    }

    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    pub fn displayed_options(&self) -> &[String] {
        &self.displayed_options
    }

    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    pub fn mapping(&self) -> &[usize] {
        &self.mapping
    }

    pub fn user_answer_text(&self) -> &str {
        &self.displayed_options[self.user_choice]
    }

    pub fn correct_answer_text(&self) -> &str {
        &self.displayed_options[self.correct_choice]
    }

    /// Bank index of a displayed position.
    pub fn original_index(&self, shuffled: usize) -> Option<usize> {
        self.mapping.iter().position(|&target| target == shuffled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
}

impl Score {
    /// Rounded percentage, half up. Zero when nothing was answered.
    pub fn percentage(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        let rounded = (200 * self.correct + self.total) / (2 * self.total);
        u32::try_from(rounded).unwrap_or(100)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} ({}%)", self.correct, self.total, self.percentage())
    }
}

/// Identifies one rendering of a question. Buttons carry it so that taps on
/// an older message can be told apart from taps on the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayToken {
    pub question: usize,
    pub shown: u32,
}

/// Final breakdown of a finished session.
#[derive(Debug, Clone)]
pub struct Results<'a> {
    pub task_id: &'a TaskId,
    pub score: Score,
    pub answers: &'a [AnswerRecord],
}

#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    task_id: TaskId,
    questions: Arc<Vec<Question>>,
    policy: QuizPolicy,
    index: usize,
    shuffle: ShuffleRecord,
    // Bumped every time a question is put on screen.
    shown: u32,
    answers: Vec<AnswerRecord>,
    phase: Phase,
}

impl Session {
    pub fn start<S, R>(
        source: &S,
        task_id: TaskId,
        policy: QuizPolicy,
        rng: &mut R,
    ) -> Result<Self, QuizError>
    where
        S: RetrieveTasks + ?Sized,
        R: Rng + ?Sized,
    {
        let questions = source.retrieve_task(&task_id)?;
        if questions.is_empty() {
            return Err(QuizError::EmptyTask(task_id));
        }
        let shuffle = Self::shuffle_for(&questions[0], policy, rng);
        let session = Self {
            id: Uuid::new_v4(),
            task_id,
            questions,
            policy,
            index: 0,
            shuffle,
            shown: 0,
            answers: Vec::new(),
            phase: Phase::Answering,
        };
        tracing::debug!(session = %session.id, task = %session.task_id, questions = session.total(), "session started");
        Ok(session)
    }

    fn shuffle_for<R: Rng + ?Sized>(question: &Question, policy: QuizPolicy, rng: &mut R) -> ShuffleRecord {
        let len = question.options().len();
        if policy.shuffle_options {
            ShuffleRecord::shuffle(len, question.correct(), rng)
        } else {
            ShuffleRecord::identity(len, question.correct())
        }
    }

    fn show<R: Rng + ?Sized>(&mut self, index: usize, rng: &mut R) {
        self.index = index;
        self.shuffle = Self::shuffle_for(&self.questions[index], self.policy, rng);
        self.shown = self.shown.wrapping_add(1);
        self.phase = Phase::Answering;
    }

    fn expect_phase(&self, expected: Phase, operation: &'static str) -> Result<(), QuizError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(QuizError::InvalidTransition {
                operation,
                phase: self.phase,
            })
        }
    }

    pub fn submit_answer(&mut self, choice: usize) -> Result<&AnswerRecord, QuizError> {
        if self.phase == Phase::Feedback {
            return Err(QuizError::AlreadyAnswered(self.index));
        }
        self.expect_phase(Phase::Answering, "answer")?;
        if choice >= self.shuffle.len() {
            return Err(QuizError::InvalidChoice {
                choice,
                options: self.shuffle.len(),
            });
        }

        let record = AnswerRecord::new(self.current_question(), &self.shuffle, choice);
        tracing::debug!(
            session = %self.id,
            question = %record.question_id,
            choice,
            correct = record.is_correct,
            "answer recorded"
        );
        // Re-answering after going back replaces that position only.
        if self.index < self.answers.len() {
            self.answers[self.index] = record;
        } else {
            self.answers.push(record);
        }
        self.phase = Phase::Feedback;
        Ok(&self.answers[self.index])
    }

    /// Moves past the feedback screen and returns the new phase.
    pub fn advance<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Phase, QuizError> {
        self.expect_phase(Phase::Feedback, "advance")?;
        if self.index + 1 < self.questions.len() {
            self.show(self.index + 1, rng);
        } else {
            self.phase = Phase::Finished;
            tracing::debug!(session = %self.id, score = %self.tally(), "session finished");
        }
        Ok(self.phase)
    }

    /// Returns to the previous question with a fresh shuffle.
    pub fn go_back<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), QuizError> {
        if !self.policy.allow_back {
            return Err(QuizError::BackNavigationDisabled);
        }
        self.expect_phase(Phase::Answering, "go back")?;
        if self.index == 0 {
            return Err(QuizError::InvalidTransition {
                operation: "go back from the first question",
                phase: self.phase,
            });
        }
        self.show(self.index - 1, rng);
        Ok(())
    }

    pub fn score(&self) -> Result<Score, QuizError> {
        match self.phase {
            Phase::Feedback | Phase::Finished => Ok(self.tally()),
            Phase::Answering => Err(QuizError::InvalidTransition {
                operation: "score",
                phase: self.phase,
            }),
        }
    }

    fn tally(&self) -> Score {
        Score {
            correct: self.answers.iter().filter(|a| a.is_correct).count(),
            total: self.answers.len(),
        }
    }

    pub fn results(&self) -> Result<Results<'_>, QuizError> {
        self.expect_phase(Phase::Finished, "show results")?;
        Ok(Results {
            task_id: &self.task_id,
            score: self.tally(),
            answers: &self.answers,
        })
    }

    /// Starts the same task over with new shuffles.
    pub fn retry<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), QuizError> {
        self.expect_phase(Phase::Finished, "retry")?;
        self.id = Uuid::new_v4();
        self.answers.clear();
        self.show(0, rng);
        tracing::debug!(session = %self.id, task = %self.task_id, "session restarted");
        Ok(())
    }

    pub fn return_home(self) {
        tracing::debug!(session = %self.id, phase = %self.phase, answered = self.answers.len(), "session closed");
    }

    pub fn id(&self) -> &Uuid {
        &self.id
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn display_token(&self) -> DisplayToken {
        DisplayToken {
            question: self.index,
            shown: self.shown,
        }
    }

    /// Fails unless `token` belongs to the question currently on screen.
    pub fn ensure_displayed(&self, token: DisplayToken) -> Result<(), QuizError> {
        if token == self.display_token() {
            Ok(())
        } else {
            Err(QuizError::InvalidTransition {
                operation: "use a button from an earlier question",
                phase: self.phase,
            })
        }
    }

    /// [`Session::submit_answer`] for a choice made on a specific rendering.
    pub fn submit_displayed(
        &mut self,
        token: DisplayToken,
        choice: usize,
    ) -> Result<&AnswerRecord, QuizError> {
        self.ensure_displayed(token)?;
        self.submit_answer(choice)
    }

    pub fn question_index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn is_last_question(&self) -> bool {
        self.index + 1 == self.questions.len()
    }

    pub fn can_go_back(&self) -> bool {
        self.policy.allow_back && self.phase == Phase::Answering && self.index > 0
    }

    /// Share of questions already passed, before the current one is answered.
    pub fn progress_percent(&self) -> usize {
        self.index * 100 / self.questions.len()
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.index]
    }

    pub fn current_shuffle(&self) -> &ShuffleRecord {
        &self.shuffle
    }

    pub fn current_options(&self) -> Vec<String> {
        self.shuffle.apply(self.current_question().options())
    }

    /// The record for the current question while its feedback is shown.
    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        match self.phase {
            Phase::Feedback => self.answers.get(self.index),
            _ => None,
        }
    }

    pub fn answers(&self) -> &[AnswerRecord] {
        &self.answers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::tests::sample_bank;
    use crate::bank::{BankHandle, QuestionBank};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(2024)
    }

    fn start(task: &str, policy: QuizPolicy) -> Session {
        Session::start(&sample_bank(), TaskId::new(task), policy, &mut rng()).unwrap()
    }

    fn wrong_choice(session: &Session) -> usize {
        (session.current_shuffle().shuffled_correct() + 1) % session.current_shuffle().len()
    }

    #[test]
    fn scores_one_of_two() {
        let mut rng = rng();
        let mut session = start("1", QuizPolicy::default());
        assert_eq!(session.phase(), Phase::Answering);

        let correct = session.current_shuffle().shuffled_correct();
        assert!(session.submit_answer(correct).unwrap().is_correct());
        assert_eq!(session.advance(&mut rng).unwrap(), Phase::Answering);

        let wrong = wrong_choice(&session);
        assert!(!session.submit_answer(wrong).unwrap().is_correct());
        assert_eq!(session.score().unwrap(), Score { correct: 1, total: 2 });
        assert_eq!(session.advance(&mut rng).unwrap(), Phase::Finished);

        let results = session.results().unwrap();
        assert_eq!(results.score, Score { correct: 1, total: 2 });
        assert_eq!(results.score.percentage(), 50);
        assert_eq!(results.answers.len(), 2);
    }

    #[test]
    fn unknown_task_fails_without_a_session() {
        let error = Session::start(
            &sample_bank(),
            TaskId::new("unknown"),
            QuizPolicy::default(),
            &mut rng(),
        )
        .unwrap_err();
        assert_eq!(error, QuizError::UnknownTask(TaskId::new("unknown")));
    }

    #[test]
    fn empty_task_is_rejected() {
        let error = Session::start(
            &sample_bank(),
            TaskId::new("10"),
            QuizPolicy::default(),
            &mut rng(),
        )
        .unwrap_err();
        assert_eq!(error, QuizError::EmptyTask(TaskId::new("10")));
    }

    #[test]
    fn start_before_bank_load_fails_fast() {
        let (_tx, handle) = BankHandle::pending();
        let error =
            Session::start(&handle, TaskId::new("1"), QuizPolicy::default(), &mut rng()).unwrap_err();
        assert_eq!(error, QuizError::BankNotLoaded);
    }

    #[test]
    fn out_of_range_choice_leaves_state_unchanged() {
        let mut session = start("1", QuizPolicy::default());
        let error = session.submit_answer(5).unwrap_err();
        assert_eq!(
            error,
            QuizError::InvalidChoice {
                choice: 5,
                options: 3
            }
        );
        assert_eq!(session.phase(), Phase::Answering);
        assert!(session.answers().is_empty());
    }

    #[test]
    fn second_submission_is_rejected() {
        let mut session = start("1", QuizPolicy::default());
        let first = session.submit_answer(0).unwrap().clone();
        assert_eq!(session.submit_answer(1).unwrap_err(), QuizError::AlreadyAnswered(0));
        assert_eq!(session.answers(), &[first]);
        assert_eq!(session.phase(), Phase::Feedback);
    }

    #[test]
    fn transitions_outside_their_phase_are_rejected() {
        let mut rng = rng();
        let mut session = start("2", QuizPolicy::default());
        assert!(matches!(
            session.advance(&mut rng),
            Err(QuizError::InvalidTransition { operation: "advance", .. })
        ));
        assert!(session.score().is_err());
        assert!(session.results().is_err());
        assert!(session.retry(&mut rng).is_err());

        session.submit_answer(0).unwrap();
        assert_eq!(session.advance(&mut rng).unwrap(), Phase::Finished);
        assert!(matches!(
            session.submit_answer(0),
            Err(QuizError::InvalidTransition { .. })
        ));
        assert!(session.advance(&mut rng).is_err());
    }

    #[test]
    fn answers_track_question_index() {
        let mut rng = rng();
        let mut session = start("1", QuizPolicy::default());
        for _ in 0..session.total() {
            let record = session.submit_answer(1).unwrap().clone();
            assert_eq!(record.is_correct(), record.user_choice() == record.correct_choice());
            assert_eq!(session.answers().len(), session.question_index() + 1);
            session.advance(&mut rng).unwrap();
        }
        assert_eq!(session.phase(), Phase::Finished);
    }

    #[test]
    fn recorded_options_round_trip_to_bank_text() {
        let bank = sample_bank();
        let mut rng = rng();
        let mut session =
            Session::start(&bank, TaskId::new("1"), QuizPolicy::default(), &mut rng).unwrap();
        let questions = bank.retrieve_task(&TaskId::new("1")).unwrap();

        for question in questions.iter() {
            let record = session.submit_answer(2).unwrap().clone();
            let user_original = record.original_index(record.user_choice()).unwrap();
            let correct_original = record.original_index(record.correct_choice()).unwrap();
            assert_eq!(record.user_answer_text(), question.options()[user_original]);
            assert_eq!(record.correct_answer_text(), question.options()[correct_original]);
            assert_eq!(correct_original, question.correct());
            session.advance(&mut rng).unwrap();
        }
    }

    #[test]
    fn duplicate_option_text_keeps_the_correct_position() {
        let mut rng = rng();
        for _ in 0..20 {
            let mut session =
                Session::start(&sample_bank(), TaskId::new("3"), QuizPolicy::default(), &mut rng)
                    .unwrap();
            let correct = session.current_shuffle().shuffled_correct();
            let other_same = (0..3)
                .find(|&i| i != correct && session.current_options()[i] == "same")
                .unwrap();
            assert!(!session.submit_answer(other_same).unwrap().is_correct());
        }
    }

    #[test]
    fn go_back_reshuffles_and_keeps_later_answers() {
        let mut rng = rng();
        let mut session = start("1", QuizPolicy::default());
        let correct = session.current_shuffle().shuffled_correct();
        session.submit_answer(correct).unwrap();
        session.advance(&mut rng).unwrap();
        assert!(session.can_go_back());

        session.go_back(&mut rng).unwrap();
        assert_eq!(session.question_index(), 0);
        assert_eq!(session.phase(), Phase::Answering);
        assert_eq!(session.answers().len(), 1);
        assert!(session.answers()[0].is_correct());

        let wrong = wrong_choice(&session);
        session.submit_answer(wrong).unwrap();
        assert_eq!(session.answers().len(), 1);
        assert!(!session.answers()[0].is_correct());
    }

    #[test]
    fn go_back_respects_policy_and_bounds() {
        let mut rng = rng();
        let mut session = start("1", QuizPolicy::default());
        assert!(matches!(
            session.go_back(&mut rng),
            Err(QuizError::InvalidTransition { .. })
        ));

        let mut session = start(
            "1",
            QuizPolicy {
                shuffle_options: true,
                allow_back: false,
            },
        );
        session.submit_answer(0).unwrap();
        session.advance(&mut rng).unwrap();
        assert!(!session.can_go_back());
        assert_eq!(
            session.go_back(&mut rng).unwrap_err(),
            QuizError::BackNavigationDisabled
        );
    }

    #[test]
    fn reshuffles_do_not_touch_recorded_answers() {
        let mut rng = rng();
        let mut session = start("1", QuizPolicy::default());
        session.submit_answer(0).unwrap();
        let mut recorded = session.answers()[0].clone();
        session.advance(&mut rng).unwrap();
        for _ in 0..5 {
            session.go_back(&mut rng).unwrap();
            assert_eq!(session.answers()[0], recorded);
            // question 1 is only reachable again by answering question 0
            recorded = session.submit_answer(0).unwrap().clone();
            assert_eq!(
                recorded.is_correct(),
                recorded.user_choice() == recorded.correct_choice()
            );
            session.advance(&mut rng).unwrap();
        }
    }

    #[test]
    fn disabled_shuffling_shows_bank_order() {
        let session = start(
            "1",
            QuizPolicy {
                shuffle_options: false,
                allow_back: true,
            },
        );
        assert_eq!(session.current_options(), vec!["2", "3", "4"]);
        assert_eq!(session.current_shuffle().shuffled_correct(), 1);
    }

    #[test]
    fn retry_starts_over_with_a_new_session_id() {
        let mut rng = rng();
        let mut session = start("2", QuizPolicy::default());
        let first_id = *session.id();
        session.submit_answer(0).unwrap();
        session.advance(&mut rng).unwrap();

        session.retry(&mut rng).unwrap();
        assert_ne!(*session.id(), first_id);
        assert_eq!(session.phase(), Phase::Answering);
        assert_eq!(session.question_index(), 0);
        assert!(session.answers().is_empty());
        assert_eq!(session.task_id(), &TaskId::new("2"));
    }

    #[test]
    fn progress_and_last_question() {
        let mut rng = rng();
        let mut session = start("1", QuizPolicy::default());
        assert_eq!(session.progress_percent(), 0);
        assert!(!session.is_last_question());
        session.submit_answer(0).unwrap();
        assert!(session.current_answer().is_some());
        session.advance(&mut rng).unwrap();
        assert_eq!(session.progress_percent(), 50);
        assert!(session.is_last_question());
        assert!(session.current_answer().is_none());
    }

    #[test]
    fn percentage_rounds_half_up_and_guards_zero() {
        assert_eq!(Score { correct: 0, total: 0 }.percentage(), 0);
        assert_eq!(Score { correct: 1, total: 3 }.percentage(), 33);
        assert_eq!(Score { correct: 2, total: 3 }.percentage(), 67);
        assert_eq!(Score { correct: 1, total: 8 }.percentage(), 13);
        assert_eq!(Score { correct: 5, total: 5 }.percentage(), 100);
        assert_eq!(Score { correct: 1, total: 2 }.to_string(), "1 / 2 (50%)");
    }

    #[test]
    fn sessions_are_independent() {
        let bank = QuestionBank::from_json(crate::bank::tests::SAMPLE_BANK).unwrap();
        let mut rng = rng();
        let mut first = Session::start(&bank, TaskId::new("1"), QuizPolicy::default(), &mut rng).unwrap();
        let second = Session::start(&bank, TaskId::new("1"), QuizPolicy::default(), &mut rng).unwrap();
        first.submit_answer(0).unwrap();
        assert!(second.answers().is_empty());
        assert_eq!(second.phase(), Phase::Answering);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn answers_from_an_earlier_rendering_are_rejected() {
        let mut rng = rng();
        let mut session = start("1", QuizPolicy::default());
        session.submit_answer(0).unwrap();
        session.advance(&mut rng).unwrap();
        let second_question = session.display_token();
        assert_eq!(second_question.question, 1);

        session.go_back(&mut rng).unwrap();
        let error = session.submit_displayed(second_question, 0).unwrap_err();
        assert!(matches!(error, QuizError::InvalidTransition { .. }));
        assert_eq!(session.phase(), Phase::Answering);
        assert_eq!(session.question_index(), 0);
        assert_eq!(session.answers().len(), 1);

        let current = session.display_token();
        assert!(session.submit_displayed(current, 1).is_ok());
    }

    #[test]
    fn revisiting_a_question_invalidates_its_old_buttons() {
        let mut rng = rng();
        let mut session = start("1", QuizPolicy::default());
        let first_showing = session.display_token();
        session.submit_answer(0).unwrap();
        session.advance(&mut rng).unwrap();
        session.go_back(&mut rng).unwrap();

        let second_showing = session.display_token();
        assert_eq!(first_showing.question, second_showing.question);
        assert_ne!(first_showing, second_showing);
        assert!(session.ensure_displayed(first_showing).is_err());
        assert!(session.ensure_displayed(second_showing).is_ok());
    }

    #[test]
    fn retry_invalidates_buttons_of_the_previous_run() {
        let mut rng = rng();
        let mut session = start("2", QuizPolicy::default());
        let before = session.display_token();
        session.submit_answer(0).unwrap();
        session.advance(&mut rng).unwrap();
        session.retry(&mut rng).unwrap();
        assert!(session.submit_displayed(before, 0).is_err());
        assert!(session.answers().is_empty());
    }
}
