use chrono::{NaiveDate, Utc};

use super::*;
use crate::{
    Campus, DatabaseError, DisplayStatus, NewBlackout, NewPlainUser, NewResource, ResourceData,
    SqliteDatabase, TimeslotData,
};

async fn campus() -> Campus<SqliteDatabase> {
    let db = SqliteDatabase::new_in_memory()
        .await
        .expect("in-memory database opens");

    Campus::new(db)
}

async fn user(campus: &Campus<SqliteDatabase>, name: &str) -> UserData {
    campus
        .auth
        .register(NewPlainUser {
            username: name.to_string(),
            password: "a very fine password".to_string(),
            display_name: name.to_string(),
        })
        .await
        .expect("user registers")
}

async fn admin(campus: &Campus<SqliteDatabase>, name: &str) -> UserData {
    campus
        .auth
        .register_admin(NewPlainUser {
            username: name.to_string(),
            password: "a very fine password".to_string(),
            display_name: name.to_string(),
        })
        .await
        .expect("admin registers")
}

async fn resource(
    campus: &Campus<SqliteDatabase>,
    name: &str,
    kind: ResourceKind,
    quantity: Option<i64>,
) -> ResourceData {
    campus
        .resources
        .create(NewResource {
            name: name.to_string(),
            kind,
            capacity: Some(8).filter(|_| kind != ResourceKind::Equipment),
            quantity,
            location: None,
            description: None,
            image_path: None,
        })
        .await
        .expect("resource is created")
}

async fn catalog(campus: &Campus<SqliteDatabase>) -> Vec<TimeslotData> {
    campus
        .resources
        .timeslot_catalog()
        .await
        .expect("catalog lists")
}

fn date(value: &str) -> NaiveDate {
    value.parse().expect("valid date")
}

fn slot_request(
    user: &UserData,
    resource: &ResourceData,
    day: NaiveDate,
    timeslot_id: PrimaryKey,
) -> NewBooking {
    NewBooking {
        user_id: user.id,
        resource_id: resource.id,
        booking_date: day,
        timeslot_id: Some(timeslot_id),
        quantity: None,
        purpose: None,
    }
}

fn unit_request(
    user: &UserData,
    resource: &ResourceData,
    day: NaiveDate,
    quantity: i64,
) -> NewBooking {
    NewBooking {
        user_id: user.id,
        resource_id: resource.id,
        booking_date: day,
        timeslot_id: None,
        quantity: Some(quantity),
        purpose: None,
    }
}

#[tokio::test]
async fn a_room_slot_holds_one_booking() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let bob = user(&campus, "bob").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("first booking lands");

    let second = campus
        .bookings
        .create(slot_request(&bob, &room, day, slots[0].id))
        .await;

    assert!(matches!(
        second,
        Err(BookingError::SlotTaken {
            kind: ResourceKind::Room
        })
    ));

    let all = campus.bookings.list_all().await.expect("bookings list");
    assert_eq!(all.len(), 1, "the losing request left no row behind");
}

#[tokio::test]
async fn lab_conflicts_report_the_lab_kind() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let lab = resource(&campus, "Chem Lab", ResourceKind::Lab, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    campus
        .bookings
        .create(slot_request(&alice, &lab, day, slots[0].id))
        .await
        .expect("first booking lands");

    let second = campus
        .bookings
        .create(slot_request(&alice, &lab, day, slots[0].id))
        .await;

    assert!(matches!(
        second,
        Err(BookingError::SlotTaken {
            kind: ResourceKind::Lab
        })
    ));
}

#[tokio::test]
async fn the_same_slot_is_free_on_another_date() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await
        .expect("first booking lands");

    campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-21"), slots[0].id))
        .await
        .expect("other date is free");

    campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[1].id))
        .await
        .expect("other slot is free");
}

#[tokio::test]
async fn a_fresh_room_offers_the_whole_catalog() {
    let campus = campus().await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let offerings = campus
        .resources
        .offerings(room.id)
        .await
        .expect("offerings list");

    assert_eq!(offerings.len(), slots.len());
    assert!(offerings.iter().all(|offering| offering.is_active));
}

#[tokio::test]
async fn rooms_require_a_timeslot() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;

    let result = campus
        .bookings
        .create(NewBooking {
            user_id: alice.id,
            resource_id: room.id,
            booking_date: date("2030-05-20"),
            timeslot_id: None,
            quantity: None,
            purpose: None,
        })
        .await;

    assert!(matches!(result, Err(BookingError::MissingTimeslot)));
}

#[tokio::test]
async fn unknown_timeslots_are_rejected() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;

    let result = campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), 9999))
        .await;

    assert!(matches!(result, Err(BookingError::InvalidTimeslot)));
}

#[tokio::test]
async fn withdrawn_timeslots_cannot_be_booked() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    campus
        .resources
        .set_offering(room.id, slots[0].id, false)
        .await
        .expect("offering withdrawn");

    let result = campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await;

    assert!(matches!(result, Err(BookingError::InvalidTimeslot)));

    let availability = campus
        .bookings
        .availability(room.id, date("2030-05-20"))
        .await
        .expect("availability resolves");

    assert!(
        !availability
            .available
            .iter()
            .chain(availability.booked.iter())
            .any(|slot| slot.id == slots[0].id),
        "withdrawn slot is not listed at all"
    );
}

#[tokio::test]
async fn equipment_draws_from_a_quantity_pool() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let bob = user(&campus, "bob").await;
    let projectors = resource(&campus, "Projector", ResourceKind::Equipment, Some(5)).await;
    let day = date("2030-05-20");

    campus
        .bookings
        .create(unit_request(&alice, &projectors, day, 3))
        .await
        .expect("three units fit");

    campus
        .bookings
        .create(unit_request(&bob, &projectors, day, 2))
        .await
        .expect("two more units fit");

    let over = campus
        .bookings
        .create(unit_request(&alice, &projectors, day, 1))
        .await;

    assert!(matches!(
        over,
        Err(BookingError::EquipmentUnavailable { available: 0 })
    ));

    campus
        .bookings
        .create(unit_request(&alice, &projectors, date("2030-05-21"), 5))
        .await
        .expect("the pool resets per date");
}

#[tokio::test]
async fn equipment_quantity_must_be_positive() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let projectors = resource(&campus, "Projector", ResourceKind::Equipment, Some(5)).await;

    let result = campus
        .bookings
        .create(unit_request(&alice, &projectors, date("2030-05-20"), 0))
        .await;

    assert!(matches!(result, Err(BookingError::InvalidQuantity)));
}

#[tokio::test]
async fn equipment_quantity_defaults_to_one() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let projectors = resource(&campus, "Projector", ResourceKind::Equipment, Some(5)).await;

    let booking = campus
        .bookings
        .create(NewBooking {
            user_id: alice.id,
            resource_id: projectors.id,
            booking_date: date("2030-05-20"),
            timeslot_id: None,
            quantity: None,
            purpose: None,
        })
        .await
        .expect("booking lands");

    assert_eq!(booking.quantity, 1);
}

#[tokio::test]
async fn availability_splits_open_and_taken_slots() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[2].id))
        .await
        .expect("booking lands");

    let availability = campus
        .bookings
        .availability(room.id, day)
        .await
        .expect("availability resolves");

    assert_eq!(availability.booked.len(), 1);
    assert_eq!(availability.booked[0].id, slots[2].id);
    assert_eq!(availability.available.len(), slots.len() - 1);
    assert_eq!(availability.remaining_quantity, None);
}

#[tokio::test]
async fn availability_counts_remaining_units() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let projectors = resource(&campus, "Projector", ResourceKind::Equipment, Some(5)).await;
    let day = date("2030-05-20");

    campus
        .bookings
        .create(unit_request(&alice, &projectors, day, 3))
        .await
        .expect("booking lands");

    let availability = campus
        .bookings
        .availability(projectors.id, day)
        .await
        .expect("availability resolves");

    assert_eq!(availability.remaining_quantity, Some(2));
    assert!(availability.available.is_empty());
}

#[tokio::test]
async fn availability_fails_for_unknown_resources() {
    let campus = campus().await;

    let result = campus.bookings.availability(404, date("2030-05-20")).await;

    assert!(matches!(
        result,
        Err(DatabaseError::NotFound {
            resource: "resource",
            ..
        })
    ));
}

#[tokio::test]
async fn bookings_require_an_existing_user() {
    let campus = campus().await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let result = campus
        .bookings
        .create(NewBooking {
            user_id: 9999,
            resource_id: room.id,
            booking_date: date("2030-05-20"),
            timeslot_id: Some(slots[0].id),
            quantity: None,
            purpose: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(BookingError::Db(DatabaseError::NotFound {
            resource: "user",
            ..
        }))
    ));
}

#[tokio::test]
async fn bookings_require_an_existing_resource() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;

    let result = campus
        .bookings
        .create(NewBooking {
            user_id: alice.id,
            resource_id: 9999,
            booking_date: date("2030-05-20"),
            timeslot_id: Some(1),
            quantity: None,
            purpose: None,
        })
        .await;

    assert!(matches!(
        result,
        Err(BookingError::Db(DatabaseError::NotFound {
            resource: "resource",
            ..
        }))
    ));
}

#[tokio::test]
async fn cancelling_frees_the_slot() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    let booking = campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("booking lands");

    let cancelled = campus
        .bookings
        .cancel(&alice, booking.id)
        .await
        .expect("cancel succeeds");
    assert_eq!(cancelled.status, BookingStatus::Cancelled);

    campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("the slot is free again");
}

#[tokio::test]
async fn only_active_bookings_can_be_cancelled() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let booking = campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await
        .expect("booking lands");

    campus
        .bookings
        .cancel(&alice, booking.id)
        .await
        .expect("cancel succeeds");

    let again = campus.bookings.cancel(&alice, booking.id).await;

    assert!(matches!(
        again,
        Err(BookingError::InvalidStatus(BookingStatus::Cancelled))
    ));
}

#[tokio::test]
async fn strangers_cannot_touch_a_booking() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let mallory = user(&campus, "mallory").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let booking = campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await
        .expect("booking lands");

    let result = campus.bookings.cancel(&mallory, booking.id).await;
    assert!(matches!(result, Err(BookingError::NotPermitted)));

    let result = campus
        .bookings
        .reschedule(
            &mallory,
            RescheduledBooking {
                id: booking.id,
                booking_date: date("2030-05-21"),
                timeslot_id: None,
                quantity: None,
            },
        )
        .await;
    assert!(matches!(result, Err(BookingError::NotPermitted)));
}

#[tokio::test]
async fn admins_can_cancel_any_booking() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let warden = admin(&campus, "warden").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let booking = campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await
        .expect("booking lands");

    let cancelled = campus
        .bookings
        .cancel(&warden, booking.id)
        .await
        .expect("admin cancels");

    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

#[tokio::test]
async fn updating_revalidates_against_everyone_else() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let bob = user(&campus, "bob").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("alice books");

    let bobs = campus
        .bookings
        .create(slot_request(&bob, &room, day, slots[1].id))
        .await
        .expect("bob books");

    let result = campus
        .bookings
        .update(
            &bob,
            UpdatedBooking {
                id: bobs.id,
                booking_date: None,
                timeslot_id: Some(slots[0].id),
                quantity: None,
                purpose: None,
            },
        )
        .await;

    assert!(matches!(result, Err(BookingError::SlotTaken { .. })));

    let unchanged = campus
        .bookings
        .for_user(bob.id)
        .await
        .expect("bookings list")
        .remove(0);

    assert_eq!(
        unchanged.timeslot.expect("slot is set").id,
        slots[1].id,
        "the failed update left the booking alone"
    );
}

#[tokio::test]
async fn updating_does_not_collide_with_itself() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let booking = campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await
        .expect("booking lands");

    let updated = campus
        .bookings
        .update(
            &alice,
            UpdatedBooking {
                id: booking.id,
                booking_date: None,
                timeslot_id: None,
                quantity: None,
                purpose: Some("club meeting".to_string()),
            },
        )
        .await
        .expect("keeping the same slot is fine");

    assert_eq!(updated.purpose.as_deref(), Some("club meeting"));
    assert_eq!(updated.status, BookingStatus::Active);
}

#[tokio::test]
async fn updating_equipment_excludes_its_own_units() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let bob = user(&campus, "bob").await;
    let projectors = resource(&campus, "Projector", ResourceKind::Equipment, Some(5)).await;
    let day = date("2030-05-20");

    let alices = campus
        .bookings
        .create(unit_request(&alice, &projectors, day, 3))
        .await
        .expect("alice books");

    campus
        .bookings
        .create(unit_request(&bob, &projectors, day, 2))
        .await
        .expect("bob books");

    // Alice can shrink, but not grow past what bob left over.
    let shrunk = campus
        .bookings
        .update(
            &alice,
            UpdatedBooking {
                id: alices.id,
                booking_date: None,
                timeslot_id: None,
                quantity: Some(2),
                purpose: None,
            },
        )
        .await
        .expect("shrinking is fine");
    assert_eq!(shrunk.quantity, 2);

    let grown = campus
        .bookings
        .update(
            &alice,
            UpdatedBooking {
                id: alices.id,
                booking_date: None,
                timeslot_id: None,
                quantity: Some(4),
                purpose: None,
            },
        )
        .await;

    assert!(matches!(
        grown,
        Err(BookingError::EquipmentUnavailable { available: 3 })
    ));
}

#[tokio::test]
async fn rescheduling_leaves_an_audit_trail() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let original = campus
        .bookings
        .create(NewBooking {
            user_id: alice.id,
            resource_id: room.id,
            booking_date: date("2030-05-20"),
            timeslot_id: Some(slots[0].id),
            quantity: None,
            purpose: Some("thesis defense".to_string()),
        })
        .await
        .expect("booking lands");

    let moved = campus
        .bookings
        .reschedule(
            &alice,
            RescheduledBooking {
                id: original.id,
                booking_date: date("2030-05-22"),
                timeslot_id: None,
                quantity: None,
            },
        )
        .await
        .expect("reschedule succeeds");

    assert_ne!(moved.id, original.id, "a fresh row was created");
    assert_eq!(moved.status, BookingStatus::Active);
    assert_eq!(moved.booking_date, date("2030-05-22"));
    assert_eq!(
        moved.timeslot.as_ref().expect("slot is set").id,
        slots[0].id,
        "the original timeslot carries over"
    );
    assert_eq!(
        moved.purpose.as_deref(),
        Some("thesis defense"),
        "the purpose carries over"
    );

    let bookings = campus.bookings.for_user(alice.id).await.expect("list");
    assert_eq!(bookings.len(), 2, "the original remains as an audit row");

    let original_now = bookings
        .iter()
        .find(|booking| booking.id == original.id)
        .expect("original still listed");
    assert_eq!(original_now.status, BookingStatus::Rescheduled);

    // The freed slot on the old date can be taken again.
    campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await
        .expect("old slot is free");
}

#[tokio::test]
async fn rescheduling_onto_the_same_slot_is_allowed() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    let original = campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("booking lands");

    // The booking's own row never counts against it.
    let moved = campus
        .bookings
        .reschedule(
            &alice,
            RescheduledBooking {
                id: original.id,
                booking_date: day,
                timeslot_id: Some(slots[0].id),
                quantity: None,
            },
        )
        .await
        .expect("rescheduling in place succeeds");

    assert_ne!(moved.id, original.id);
    assert_eq!(moved.booking_date, day);
}

#[tokio::test]
async fn a_failed_reschedule_changes_nothing() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let bob = user(&campus, "bob").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("alice books");

    let bobs = campus
        .bookings
        .create(slot_request(&bob, &room, day, slots[1].id))
        .await
        .expect("bob books");

    let result = campus
        .bookings
        .reschedule(
            &bob,
            RescheduledBooking {
                id: bobs.id,
                booking_date: day,
                timeslot_id: Some(slots[0].id),
                quantity: None,
            },
        )
        .await;

    assert!(matches!(result, Err(BookingError::SlotTaken { .. })));

    let bookings = campus.bookings.for_user(bob.id).await.expect("list");
    assert_eq!(bookings.len(), 1, "no half-applied reschedule remains");
    assert_eq!(bookings[0].status, BookingStatus::Active);
    assert_eq!(
        bookings[0].timeslot.as_ref().expect("slot is set").id,
        slots[1].id
    );
}

#[tokio::test]
async fn rescheduling_requires_an_active_booking() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let booking = campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await
        .expect("booking lands");

    campus
        .bookings
        .cancel(&alice, booking.id)
        .await
        .expect("cancel succeeds");

    let result = campus
        .bookings
        .reschedule(
            &alice,
            RescheduledBooking {
                id: booking.id,
                booking_date: date("2030-05-21"),
                timeslot_id: None,
                quantity: None,
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(BookingError::InvalidStatus(BookingStatus::Cancelled))
    ));
}

#[tokio::test]
async fn blackouts_block_new_bookings() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    campus
        .resources
        .add_blackout(NewBlackout {
            resource_id: room.id,
            blackout_date: day,
            reason: Some("maintenance".to_string()),
        })
        .await
        .expect("blackout applies");

    let result = campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await;

    assert!(matches!(result, Err(BookingError::BlackedOut(blocked)) if blocked == day));

    campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-21"), slots[0].id))
        .await
        .expect("the next day is unaffected");
}

#[tokio::test]
async fn blackouts_cancel_and_notify_in_one_sweep() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let bob = user(&campus, "bob").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    let alices = campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("alice books the blackout day");

    // Bob's booking is on another date and survives, but he still gets the
    // general notice because he holds an upcoming booking on this resource.
    campus
        .bookings
        .create(slot_request(&bob, &room, date("2030-05-25"), slots[0].id))
        .await
        .expect("bob books another day");

    let application = campus
        .resources
        .add_blackout(NewBlackout {
            resource_id: room.id,
            blackout_date: day,
            reason: Some("fire drill".to_string()),
        })
        .await
        .expect("blackout applies");

    assert_eq!(application.cancelled.len(), 1);
    assert_eq!(application.cancelled[0].id, alices.id);
    assert_eq!(application.cancelled[0].status, BookingStatus::Cancelled);
    assert_eq!(application.notified_users, 2);

    let stored = campus
        .bookings
        .for_user(alice.id)
        .await
        .expect("list")
        .remove(0);
    assert_eq!(stored.status, BookingStatus::Cancelled);

    let alices_inbox = campus
        .notifications
        .for_user(alice.id)
        .await
        .expect("notifications list");
    assert_eq!(alices_inbox.len(), 2);
    assert!(alices_inbox
        .iter()
        .any(|notification| notification.title == "Booking Cancelled"
            && notification.message.contains("fire drill")));
    assert!(alices_inbox
        .iter()
        .any(|notification| notification.title == "Resource Unavailable"));

    let bobs_inbox = campus
        .notifications
        .for_user(bob.id)
        .await
        .expect("notifications list");
    assert_eq!(bobs_inbox.len(), 1);
    assert_eq!(bobs_inbox[0].title, "Resource Unavailable");

    let survivors = campus.bookings.for_user(bob.id).await.expect("list");
    assert_eq!(survivors[0].status, BookingStatus::Active);
}

#[tokio::test]
async fn reapplying_a_blackout_updates_the_reason() {
    let campus = campus().await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let day = date("2030-05-20");

    campus
        .resources
        .add_blackout(NewBlackout {
            resource_id: room.id,
            blackout_date: day,
            reason: Some("maintenance".to_string()),
        })
        .await
        .expect("blackout applies");

    campus
        .resources
        .add_blackout(NewBlackout {
            resource_id: room.id,
            blackout_date: day,
            reason: Some("extended maintenance".to_string()),
        })
        .await
        .expect("reapplying is fine");

    let blackouts = campus
        .resources
        .blackouts(room.id)
        .await
        .expect("blackouts list");

    assert_eq!(blackouts.len(), 1, "one row per resource and date");
    assert_eq!(blackouts[0].reason.as_deref(), Some("extended maintenance"));
}

#[tokio::test]
async fn blacked_out_dates_report_nothing_available() {
    let campus = campus().await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let projectors = resource(&campus, "Projector", ResourceKind::Equipment, Some(5)).await;
    let day = date("2030-05-20");

    for resource_id in [room.id, projectors.id] {
        campus
            .resources
            .add_blackout(NewBlackout {
                resource_id,
                blackout_date: day,
                reason: None,
            })
            .await
            .expect("blackout applies");

        let availability = campus
            .bookings
            .availability(resource_id, day)
            .await
            .expect("availability resolves");

        assert!(availability.available.is_empty());
        assert!(availability.booked.is_empty());
        assert_eq!(availability.remaining_quantity, Some(0));
    }
}

#[tokio::test]
async fn removing_a_blackout_reopens_the_date() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    campus
        .resources
        .add_blackout(NewBlackout {
            resource_id: room.id,
            blackout_date: day,
            reason: None,
        })
        .await
        .expect("blackout applies");

    campus
        .resources
        .remove_blackout(room.id, day)
        .await
        .expect("blackout lifts");

    campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("the date is bookable again");
}

#[tokio::test]
async fn past_active_bookings_read_as_completed() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;

    let booking = campus
        .bookings
        .create(slot_request(&alice, &room, date("2020-01-06"), slots[0].id))
        .await
        .expect("past dates may be recorded");

    let today = Utc::now().date_naive();
    assert_eq!(booking.display_status(today), DisplayStatus::Completed);
    assert_eq!(booking.status, BookingStatus::Active, "storage is untouched");
}

#[tokio::test]
async fn stats_summarize_the_ledger() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let projectors = resource(&campus, "Projector", ResourceKind::Equipment, Some(5)).await;
    let slots = catalog(&campus).await;

    campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-05-20"), slots[0].id))
        .await
        .expect("upcoming booking");

    campus
        .bookings
        .create(slot_request(&alice, &room, date("2020-01-06"), slots[0].id))
        .await
        .expect("past booking");

    let cancelled = campus
        .bookings
        .create(unit_request(&alice, &projectors, date("2030-05-20"), 2))
        .await
        .expect("equipment booking");
    campus
        .bookings
        .cancel(&alice, cancelled.id)
        .await
        .expect("cancel succeeds");

    let moved = campus
        .bookings
        .create(slot_request(&alice, &room, date("2030-06-01"), slots[1].id))
        .await
        .expect("booking to move");
    campus
        .bookings
        .reschedule(
            &alice,
            RescheduledBooking {
                id: moved.id,
                booking_date: date("2030-06-02"),
                timeslot_id: None,
                quantity: None,
            },
        )
        .await
        .expect("reschedule succeeds");

    let stats = campus.bookings.stats().await.expect("stats resolve");

    assert_eq!(stats.total, 5);
    assert_eq!(stats.active, 2, "the upcoming booking and the moved one");
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(stats.rescheduled, 1);

    let rooms = stats
        .by_kind
        .iter()
        .find(|entry| entry.kind == ResourceKind::Room)
        .expect("room bucket");
    assert_eq!(rooms.count, 4);

    let equipment = stats
        .by_kind
        .iter()
        .find(|entry| entry.kind == ResourceKind::Equipment)
        .expect("equipment bucket");
    assert_eq!(equipment.count, 1);
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
    let campus = campus().await;
    let alice = user(&campus, "alice").await;
    let mallory = user(&campus, "mallory").await;
    let room = resource(&campus, "Study Room A", ResourceKind::Room, None).await;
    let slots = catalog(&campus).await;
    let day = date("2030-05-20");

    campus
        .bookings
        .create(slot_request(&alice, &room, day, slots[0].id))
        .await
        .expect("booking lands");

    campus
        .resources
        .add_blackout(NewBlackout {
            resource_id: room.id,
            blackout_date: day,
            reason: None,
        })
        .await
        .expect("blackout applies");

    let inbox = campus
        .notifications
        .for_user(alice.id)
        .await
        .expect("notifications list");
    assert!(!inbox.is_empty());
    assert!(inbox.iter().all(|notification| !notification.is_read));

    // Another user cannot flip someone else's notification.
    let foreign = campus
        .notifications
        .mark_read(inbox[0].id, mallory.id)
        .await;
    assert!(matches!(
        foreign,
        Err(DatabaseError::NotFound {
            resource: "notification",
            ..
        })
    ));

    let read = campus
        .notifications
        .mark_read(inbox[0].id, alice.id)
        .await
        .expect("marking read succeeds");
    assert!(read.is_read);

    campus
        .notifications
        .mark_all_read(alice.id)
        .await
        .expect("marking all read succeeds");

    let inbox = campus
        .notifications
        .for_user(alice.id)
        .await
        .expect("notifications list");
    assert!(inbox.iter().all(|notification| notification.is_read));
}
