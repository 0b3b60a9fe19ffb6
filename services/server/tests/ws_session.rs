mod common;

use cca_protocol::{CourseGroup, CourseType, ServerMessage};
use cca_test_utils::CcaWsClient;
use common::SeedCourse;

#[tokio::test]
async fn hello_reports_state_confirmation_and_current_choices() {
    let server = common::spawn().await;
    let staff_cookie = common::login_as(&server.pool, "staff1", "Staffer", "Staff").await;
    common::open_year_group(&server, &staff_cookie, "Y9").await;
    let cookie = common::login_as(&server.pool, "u1", "Alice", "Y9").await;

    let mut client = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie)
        .await
        .expect("connect");
    client.send(&cca_protocol::ClientMessage::Hello).await.expect("send HELLO");

    assert_eq!(client.recv().await.unwrap(), ServerMessage::Start);
    assert_eq!(client.recv().await.unwrap(), ServerMessage::Unconfirmed);
    assert_eq!(client.recv().await.unwrap(), ServerMessage::Hi { course_ids: vec![] });
}

#[tokio::test]
async fn choosing_an_open_seat_is_accepted_and_tracked() {
    let server = common::spawn().await;
    let staff_cookie = common::login_as(&server.pool, "staff1", "Staffer", "Staff").await;
    common::open_year_group(&server, &staff_cookie, "Y9").await;
    let course_id = common::seed_course(
        &server,
        "CHESS",
        SeedCourse {
            max: 2,
            title: "Chess Club",
            course_type: CourseType::NonSport,
            group: CourseGroup::Mw1,
        },
    )
    .await;

    let cookie = common::login_as(&server.pool, "u1", "Alice", "Y9").await;
    let mut client = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie)
        .await
        .expect("connect");

    client
        .send(&cca_protocol::ClientMessage::Choose { course_id })
        .await
        .expect("send choose");
    assert_eq!(client.recv().await.unwrap(), ServerMessage::Accepted { course_id });
}

#[tokio::test]
async fn choosing_a_second_course_in_the_same_group_is_rejected() {
    let server = common::spawn().await;
    let staff_cookie = common::login_as(&server.pool, "staff1", "Staffer", "Staff").await;
    common::open_year_group(&server, &staff_cookie, "Y9").await;
    let first = common::seed_course(
        &server,
        "CHESS",
        SeedCourse {
            max: 5,
            title: "Chess Club",
            course_type: CourseType::NonSport,
            group: CourseGroup::Mw1,
        },
    )
    .await;
    let second = common::seed_course(
        &server,
        "DEBATE",
        SeedCourse {
            max: 5,
            title: "Debate Society",
            course_type: CourseType::NonSport,
            group: CourseGroup::Mw1,
        },
    )
    .await;

    let cookie = common::login_as(&server.pool, "u1", "Alice", "Y9").await;
    let mut client = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie)
        .await
        .expect("connect");

    client.send(&cca_protocol::ClientMessage::Choose { course_id: first }).await.unwrap();
    assert_eq!(client.recv().await.unwrap(), ServerMessage::Accepted { course_id: first });

    client.send(&cca_protocol::ClientMessage::Choose { course_id: second }).await.unwrap();
    assert_eq!(client.recv().await.unwrap(), ServerMessage::GroupConflict { course_id: second });
}

#[tokio::test]
async fn a_full_course_rejects_further_choices() {
    let server = common::spawn().await;
    let staff_cookie = common::login_as(&server.pool, "staff1", "Staffer", "Staff").await;
    common::open_year_group(&server, &staff_cookie, "Y9").await;
    let course_id = common::seed_course(
        &server,
        "CHESS",
        SeedCourse {
            max: 1,
            title: "Chess Club",
            course_type: CourseType::NonSport,
            group: CourseGroup::Mw1,
        },
    )
    .await;

    let cookie_a = common::login_as(&server.pool, "u1", "Alice", "Y9").await;
    let mut client_a = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie_a)
        .await
        .expect("connect a");
    client_a.send(&cca_protocol::ClientMessage::Choose { course_id }).await.unwrap();
    assert_eq!(client_a.recv().await.unwrap(), ServerMessage::Accepted { course_id });

    let cookie_b = common::login_as(&server.pool, "u2", "Bob", "Y9").await;
    let mut client_b = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie_b)
        .await
        .expect("connect b");
    client_b.send(&cca_protocol::ClientMessage::Choose { course_id }).await.unwrap();
    assert_eq!(client_b.recv().await.unwrap(), ServerMessage::Full { course_id });
}

#[tokio::test]
async fn confirm_is_rejected_below_the_year_groups_minimum() {
    let server = common::spawn().await;
    let staff_cookie = common::login_as(&server.pool, "staff1", "Staffer", "Staff").await;
    common::open_year_group(&server, &staff_cookie, "Y9").await;

    let cookie = common::login_as(&server.pool, "u1", "Alice", "Y9").await;
    let mut client = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie)
        .await
        .expect("connect");

    client.send(&cca_protocol::ClientMessage::Confirm).await.unwrap();
    match client.recv().await.unwrap() {
        ServerMessage::ConfirmRejected { reason } => {
            assert!(reason.contains("0 out of required 1"), "unexpected reason: {reason}");
        }
        other => panic!("expected ConfirmRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn unauthenticated_connections_are_refused() {
    let server = common::spawn().await;
    let mut client = CcaWsClient::connect(&server.ws_url("/ws")).await.expect("connect without cookie");
    assert_eq!(client.recv().await.unwrap(), ServerMessage::Unauthenticated);
}

#[tokio::test]
async fn a_second_session_for_the_same_user_preempts_the_first() {
    let server = common::spawn().await;
    let staff_cookie = common::login_as(&server.pool, "staff1", "Staffer", "Staff").await;
    common::open_year_group(&server, &staff_cookie, "Y9").await;
    let cookie = common::login_as(&server.pool, "u1", "Alice", "Y9").await;

    let mut first = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie)
        .await
        .expect("connect first");
    // Keep the first session alive until the second registers and preempts it.
    let _second = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie)
        .await
        .expect("connect second");
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    match first.recv().await.unwrap() {
        ServerMessage::Error { reason } => assert_eq!(reason, "Context canceled"),
        other => panic!("expected the first connection to be closed with Error, got {other:?}"),
    }
}

#[tokio::test]
async fn a_frame_exceeding_the_configured_argument_cap_is_a_terminal_error() {
    let server = common::spawn().await;
    let staff_cookie = common::login_as(&server.pool, "staff1", "Staffer", "Staff").await;
    common::open_year_group(&server, &staff_cookie, "Y9").await;
    let cookie = common::login_as(&server.pool, "u1", "Alice", "Y9").await;

    let mut client = CcaWsClient::connect_with_session_cookie(&server.ws_url("/ws"), &cookie)
        .await
        .expect("connect");

    // The default `perf.msg_args_cap` is 16; this frame has 17 fields.
    let oversized_frame = "Y ".to_owned() + &vec!["1"; 17].join(" ");
    client.send_raw(&oversized_frame).await.expect("send oversized frame");

    match client.recv().await.unwrap() {
        ServerMessage::Error { reason } => assert!(
            reason.contains("maximum of 16 fields"),
            "unexpected reason: {reason}"
        ),
        other => panic!("expected a terminal Error, got {other:?}"),
    }
}
