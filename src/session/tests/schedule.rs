use crate::session::tests::utils::{day, session};
use crate::session::{SessionError, View};
use crate::time::SlotTime;
use crate::timetable::{ScheduleError, ScheduleRequest};

#[test]
fn test_schedule_is_drafted_for_the_warehouse() {
    let mut session = session();
    session.switch_view(View::FastLaneSchedule);

    let draft = session.generate_schedule(&ScheduleRequest::default()).unwrap();

    assert_eq!("APC2", draft.place);
    assert_eq!(day(16), draft.applies_from);
    assert_eq!(Some(&SlotTime::hm(16, 0)), draft.times.last());
    assert_eq!(5, session.schedule().unwrap().docks.len());
}

#[test]
fn test_schedule_rows_can_be_revised() {
    let mut session = session();
    session.switch_view(View::FastLaneSchedule);

    assert!(matches!(
        session.revise_schedule(0, "A9", "Spare"),
        Err(SessionError::NoSchedule)
    ));
    session.generate_schedule(&ScheduleRequest::default()).unwrap();

    let draft = session.revise_schedule(0, "A9", "Spare").unwrap();
    assert_eq!("A9 (Spare)", draft.docks[0].to_string());
    assert!(matches!(
        session.revise_schedule(9, "A9", "Spare"),
        Err(SessionError::Schedule(ScheduleError::UnknownRow(10)))
    ));
}

#[test]
fn test_schedule_needs_schedule_view() {
    let mut session = session();

    assert!(matches!(
        session.generate_schedule(&ScheduleRequest::default()),
        Err(SessionError::ViewInactive(View::FastLaneBooking))
    ));
    assert!(session.schedule().is_none());
    assert_eq!(4, session.facility().rows());
}
