//! End-to-end engine tests over a file-backed store.
//!
//! These tests drive the full pipeline (distribute → invest → grade →
//! interest) and check the invariants that must hold after every step.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use peerfund_core::distributor::{DistributionRequest, EvaluationWindow};
use peerfund_core::ledger::InvestmentRequest;
use peerfund_core::model::{
    Assignment, Enrollment, EvaluationStatus, Submission, SubmissionStatus, Team, Tier,
};
use peerfund_core::{Dataset, EngineConfig, NoopReporter, PeerFundEngine, Store};
use peerfund_store::FileStore;

/// `teams` teams of three students, all submitted.
fn dataset(teams: usize) -> Dataset {
    let now = Utc::now();
    let mut data = Dataset {
        assignments: vec![Assignment {
            id: "hw".into(),
            course_id: "c".into(),
            name: "Homework".into(),
        }],
        ..Default::default()
    };
    for t in 0..teams {
        let members: Vec<String> = (0..3).map(|m| format!("u{}", t * 3 + m)).collect();
        for m in &members {
            data.enrollments.push(Enrollment {
                course_id: "c".into(),
                student_id: m.clone(),
                active: true,
            });
        }
        data.teams.push(Team {
            id: format!("team{t}"),
            course_id: "c".into(),
            name: format!("Team {t}"),
            members,
        });
        data.submissions.push(Submission {
            id: format!("sub{t}"),
            assignment_id: "hw".into(),
            team_id: format!("team{t}"),
            status: SubmissionStatus::Submitted,
            submitted_at: now - Duration::minutes(60 - t as i64),
        });
    }
    data
}

fn engine(dir: &tempfile::TempDir, data: Dataset, regrade: bool) -> PeerFundEngine {
    let store = FileStore::create(dir.path().join("data.json"), data).unwrap();
    let config = EngineConfig {
        seed: Some(11),
        regrade_on_investment: regrade,
        ..Default::default()
    };
    PeerFundEngine::new(Arc::new(store), config)
}

fn window() -> EvaluationWindow {
    let now = Utc::now();
    EvaluationWindow {
        start_at: now,
        due_at: now + Duration::days(5),
    }
}

#[tokio::test]
async fn full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir, dataset(6), false);

    let report = engine
        .distribute(&DistributionRequest {
            assignment_id: "hw".into(),
            evaluations_per_student: 3,
            window: window(),
        })
        .await
        .unwrap();
    assert_eq!(report.count(), 18 * 3);
    assert!(report.shortfalls.is_empty());

    // Nobody evaluates their own team.
    let teams: HashMap<String, Team> = engine
        .store()
        .teams("c")
        .await
        .unwrap()
        .into_iter()
        .map(|t| (t.id.clone(), t))
        .collect();
    for e in engine.store().evaluation_assignments(Some("hw")).await.unwrap() {
        assert!(!teams[&e.team_id].has_member(&e.evaluator_id));
    }
    assert!(engine.find_self_evaluations().await.unwrap().is_empty());

    // Every student invests 30 tokens in each assigned team; one team gets more.
    for e in &report.created {
        let tokens = if e.team_id == "team5" { 40 } else { 30 };
        engine
            .invest(InvestmentRequest {
                assignment_id: "hw".into(),
                investor_id: e.evaluator_id.clone(),
                team_id: e.team_id.clone(),
                tokens,
                incomplete: false,
                comment: String::new(),
            })
            .await
            .unwrap();
    }
    let evaluations = engine.store().evaluation_assignments(Some("hw")).await.unwrap();
    assert!(evaluations
        .iter()
        .all(|e| e.status == EvaluationStatus::Completed));

    let first = engine.grade("hw", &NoopReporter).await.unwrap();
    let second = engine.grade("hw", &NoopReporter).await.unwrap();
    assert_eq!(first.graded(), 6);
    assert_eq!(engine.store().grades("hw").await.unwrap().len(), 6);
    for (a, b) in first.grades.iter().zip(&second.grades) {
        assert_eq!(a.team_id, b.team_id);
        assert_eq!(a.tier, b.tier);
        assert_eq!(a.average_investment, b.average_investment);
    }
    let team5 = first.grades.iter().find(|g| g.team_id == "team5").unwrap();
    assert_eq!(team5.tier, Tier::High);
    assert_eq!(team5.average_investment, 40.0);

    let tiers: Vec<Tier> = first.grades.iter().map(|g| g.tier).collect();
    assert_eq!(tiers.iter().filter(|t| **t == Tier::High).count(), 2);
    assert_eq!(tiers.iter().filter(|t| **t == Tier::Median).count(), 2);
    assert_eq!(tiers.iter().filter(|t| **t == Tier::Low).count(), 2);

    let interest = engine.calculate_interest("hw", &NoopReporter).await.unwrap();
    engine.calculate_interest("hw", &NoopReporter).await.unwrap();
    assert_eq!(interest.students.len(), 18);
    assert!(interest.skipped.is_empty());
    assert_eq!(
        engine.store().interest_records("hw", None).await.unwrap().len(),
        18 * 3
    );

    for student in &interest.students {
        let expected: Decimal = student.records.iter().map(|r| r.interest).sum();
        assert_eq!(student.total_interest, expected);
    }

    let status = engine.evaluation_status("hw").await.unwrap();
    assert_eq!(status.finished(), 18);
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.json");
    {
        let engine = engine(&dir, dataset(3), true);
        engine
            .invest(InvestmentRequest {
                assignment_id: "hw".into(),
                investor_id: "u0".into(),
                team_id: "team1".into(),
                tokens: 40,
                incomplete: false,
                comment: "solid work".into(),
            })
            .await
            .unwrap();
        engine
            .calculate_student_interest("u0", "hw")
            .await
            .unwrap();
    }

    let store = FileStore::open(&path).unwrap();
    let grade = store.grade("hw", "team1").await.unwrap().unwrap();
    assert_eq!(grade.tier, Tier::High);
    assert_eq!(grade.percentage, 100);

    let records = store.interest_records("hw", Some("u0")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].interest, Decimal::from(8));
}

#[tokio::test]
async fn budget_holds_under_concurrent_investments() {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(engine(&dir, dataset(5), false));

    let mut handles = Vec::new();
    for team in ["team1", "team2", "team3", "team4"] {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .invest(InvestmentRequest {
                    assignment_id: "hw".into(),
                    investor_id: "u0".into(),
                    team_id: team.into(),
                    tokens: 45,
                    incomplete: false,
                    comment: String::new(),
                })
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }
    assert_eq!(accepted, 2);

    let spent: u32 = engine
        .store()
        .investments_by("hw", "u0")
        .await
        .unwrap()
        .iter()
        .map(|i| i.tokens)
        .sum();
    assert_eq!(spent, 90);
}
