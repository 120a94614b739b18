use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use crate::types::{Amount, Donation, Fundable, Funding, FundingChange, Project};
use crate::{plan, Allocation, AllocationError};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// In-memory stand-in for the ledger store: holds every record, feeds the
/// open ones to `plan` and writes the diffs back.
#[derive(Default)]
struct Book {
    projects: Vec<Project>,
    donations: Vec<Donation>,
    clock: i64,
}

impl Book {
    fn tick(&mut self) -> DateTime<Utc> {
        self.clock += 1;
        t0() + Duration::minutes(self.clock)
    }

    fn add_project(&mut self, full: Amount) -> usize {
        let created = self.tick();
        let id = self.projects.len() as i64 + 1;
        self.projects.push(Project {
            id,
            name: format!("project {id}"),
            description: "roof repairs".into(),
            funding: Funding::open(full, created),
        });
        self.projects.len() - 1
    }

    fn add_donation(&mut self, full: Amount) -> usize {
        let created = self.tick();
        let id = self.donations.len() as i64 + 1;
        self.donations.push(Donation {
            id,
            owner_id: 42,
            comment: None,
            funding: Funding::open(full, created),
        });
        self.donations.len() - 1
    }

    fn run(&mut self) -> Allocation {
        let now = self.tick();
        let open_projects = open(&self.projects);
        let open_donations = open(&self.donations);
        let allocation = plan(open_projects, open_donations, now).unwrap();
        for change in &allocation.projects {
            apply(&mut self.projects, change);
        }
        for change in &allocation.donations {
            apply(&mut self.donations, change);
        }
        allocation
    }

    fn all_funding(&self) -> impl Iterator<Item = &Funding> {
        self.projects
            .iter()
            .map(|p| &p.funding)
            .chain(self.donations.iter().map(|d| &d.funding))
    }
}

trait FundingMut: Fundable {
    fn funding_mut(&mut self) -> &mut Funding;
}

impl FundingMut for Project {
    fn funding_mut(&mut self) -> &mut Funding {
        &mut self.funding
    }
}

impl FundingMut for Donation {
    fn funding_mut(&mut self) -> &mut Funding {
        &mut self.funding
    }
}

fn open<T: Fundable + Clone>(records: &[T]) -> Vec<T> {
    records
        .iter()
        .filter(|r| r.funding().is_open())
        .cloned()
        .collect()
}

fn apply<T: FundingMut>(records: &mut [T], change: &FundingChange) {
    let record = records
        .iter_mut()
        .find(|r| r.id() == change.id)
        .expect("change for unknown record");
    let funding = record.funding_mut();
    assert_eq!(funding.invested_amount, change.previous_invested);
    funding.invested_amount = change.invested_amount;
    funding.fully_invested = change.fully_invested();
    funding.close_date = change.close_date;
}

fn assert_consistent(funding: &Funding) {
    assert!(funding.invested_amount >= 0);
    assert!(funding.invested_amount <= funding.full_amount);
    assert_eq!(
        funding.fully_invested,
        funding.invested_amount == funding.full_amount
    );
    assert_eq!(funding.fully_invested, funding.close_date.is_some());
}

#[test]
fn test_fifo_priority_between_projects() {
    let mut book = Book::default();
    let p1 = book.add_project(100);
    let p2 = book.add_project(50);
    let d = book.add_donation(120);

    let allocation = book.run();

    assert_eq!(allocation.consumed, 120);
    assert_eq!(book.projects[p1].funding.invested_amount, 100);
    assert!(book.projects[p1].funding.close_date.is_some());
    assert_eq!(book.projects[p2].funding.invested_amount, 20);
    assert!(book.projects[p2].funding.is_open());
    assert_eq!(book.donations[d].funding.invested_amount, 120);
    assert!(book.donations[d].funding.fully_invested);
}

#[test]
fn test_new_project_without_surplus_stays_unfunded() {
    let mut book = Book::default();
    book.add_project(30);
    let d = book.add_donation(30);
    book.run();
    assert!(!book.donations[d].funding.is_open());

    let before = book.donations.clone();
    let p = book.add_project(500);
    let allocation = book.run();

    assert!(allocation.is_empty());
    assert_eq!(allocation.totals.supply, 0);
    assert_eq!(book.donations, before);
    assert_eq!(book.projects[p].funding.invested_amount, 0);
    assert!(book.projects[p].funding.is_open());
}

#[test]
fn test_exact_fill_closes_both_sides() {
    let mut book = Book::default();
    let p = book.add_project(100);
    let d = book.add_donation(100);

    let allocation = book.run();

    assert_eq!(allocation.closed_projects(), 1);
    assert_eq!(allocation.closed_donations(), 1);
    for funding in [&book.projects[p].funding, &book.donations[d].funding] {
        assert_eq!(funding.invested_amount, funding.full_amount);
        assert!(funding.fully_invested);
        assert!(funding.close_date.is_some());
    }
}

#[test]
fn test_second_run_without_new_records_is_a_no_op() {
    let mut book = Book::default();
    book.add_project(80);
    book.add_donation(50);
    book.add_donation(60);
    let first = book.run();
    assert_eq!(first.consumed, 80);

    let snapshot = (book.projects.clone(), book.donations.clone());
    let second = book.run();

    assert!(second.is_empty());
    assert_eq!(second.consumed, 0);
    assert_eq!((book.projects.clone(), book.donations.clone()), snapshot);
}

#[test]
fn test_new_donation_fills_existing_gaps_in_order() {
    let mut book = Book::default();
    let p1 = book.add_project(40);
    let p2 = book.add_project(40);
    let d1 = book.add_donation(30);
    book.run();
    assert_eq!(book.projects[p1].funding.invested_amount, 30);

    let d2 = book.add_donation(45);
    let allocation = book.run();

    assert_eq!(allocation.consumed, 45);
    assert!(book.projects[p1].funding.fully_invested);
    assert_eq!(book.projects[p2].funding.invested_amount, 35);
    assert!(book.donations[d1].funding.fully_invested);
    assert!(book.donations[d2].funding.fully_invested);
}

#[test]
fn test_older_donation_is_spent_before_newer() {
    let mut book = Book::default();
    let d1 = book.add_donation(70);
    let d2 = book.add_donation(70);
    book.add_project(100);

    book.run();

    assert!(book.donations[d1].funding.fully_invested);
    assert_eq!(book.donations[d2].funding.invested_amount, 30);
    assert!(book.donations[d2].funding.is_open());
}

#[test]
fn test_ties_on_create_date_are_broken_by_id() {
    let created = t0();
    let project = |id| Project {
        id,
        name: format!("p{id}"),
        description: "d".into(),
        funding: Funding::open(10, created),
    };
    let donation = Donation {
        id: 1,
        owner_id: 1,
        comment: None,
        funding: Funding::open(10, created),
    };

    let allocation = plan(vec![project(9), project(4)], vec![donation], t0()).unwrap();

    assert_eq!(allocation.projects.len(), 1);
    assert_eq!(allocation.projects[0].id, 4);
}

#[test]
fn test_closed_input_is_refused() {
    let mut closed = Funding::open(10, t0());
    closed.invested_amount = 10;
    closed.fully_invested = true;
    closed.close_date = Some(t0());
    let donation = Donation {
        id: 5,
        owner_id: 1,
        comment: None,
        funding: closed,
    };

    assert_eq!(
        plan(Vec::new(), vec![donation], t0()),
        Err(AllocationError::ClosedRecord {
            kind: "donation",
            id: 5
        })
    );
}

#[derive(Clone, Debug)]
enum Event {
    Project(Amount),
    Donation(Amount),
}

fn event_strategy() -> impl Strategy<Value = Event> {
    prop_oneof![
        (1i64..500).prop_map(Event::Project),
        (1i64..500).prop_map(Event::Donation),
    ]
}

proptest! {
    #[test]
    fn prop_every_run_conserves_money(events in prop::collection::vec(event_strategy(), 1..40)) {
        let mut book = Book::default();

        for event in events {
            match event {
                Event::Project(amount) => { book.add_project(amount); }
                Event::Donation(amount) => { book.add_donation(amount); }
            }

            let demand: Amount = open(&book.projects).iter().map(|p| p.funding.remaining()).sum();
            let supply: Amount = open(&book.donations).iter().map(|d| d.funding.remaining()).sum();

            let allocation = book.run();

            let absorbed: Amount = allocation.projects.iter().map(FundingChange::delta).sum();
            let spent: Amount = allocation.donations.iter().map(FundingChange::delta).sum();
            prop_assert_eq!(absorbed, demand.min(supply));
            prop_assert_eq!(spent, demand.min(supply));

            // At most one frontier per side.
            prop_assert!(allocation.projects.iter().filter(|c| !c.fully_invested()).count() <= 1);
            prop_assert!(allocation.donations.iter().filter(|c| !c.fully_invested()).count() <= 1);

            // After a run one side is always exhausted.
            let open_projects = open(&book.projects);
            let open_donations = open(&book.donations);
            prop_assert!(open_projects.is_empty() || open_donations.is_empty());

            for funding in book.all_funding() {
                assert_consistent(funding);
            }
        }
    }

    #[test]
    fn prop_totals_balance_over_history(events in prop::collection::vec(event_strategy(), 1..40)) {
        let mut book = Book::default();
        for event in events {
            match event {
                Event::Project(amount) => { book.add_project(amount); }
                Event::Donation(amount) => { book.add_donation(amount); }
            }
            book.run();
        }

        let invested_in_projects: Amount = book.projects.iter().map(|p| p.funding.invested_amount).sum();
        let spent_from_donations: Amount = book.donations.iter().map(|d| d.funding.invested_amount).sum();
        prop_assert_eq!(invested_in_projects, spent_from_donations);
    }
}
