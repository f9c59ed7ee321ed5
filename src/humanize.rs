// -------------------------
// Human behavior noise
// -------------------------
//
// Raw CDP input dispatch rather than element-level clicks: the events land on
// the page exactly like real pointer traffic. Everything here is best-effort;
// a failed dispatch must never fail the caller.

use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use rand::{Rng, rng};
use tokio::time::sleep;

/// Viewport region the pointer wanders within.
const POINTER_X: (f64, f64) = (80.0, 1100.0);
const POINTER_Y: (f64, f64) = (120.0, 700.0);

/// Wheel delta bounds per nudge (px).
const SCROLL_DELTA: (i64, i64) = (200, 700);

/// Pause after the pointer move and after the scroll (ms).
const MOVE_PAUSE_MS: (u64, u64) = (500, 1500);
const SCROLL_PAUSE_MS: (u64, u64) = (500, 1000);

/// One randomized pointer move, a jittered pause, one bounded scroll, and a
/// second pause.
pub async fn act_human(page: &Page) {
    let (x, y, delta, move_pause, scroll_pause) = {
        let mut r = rng();
        (
            r.random_range(POINTER_X.0..POINTER_X.1),
            r.random_range(POINTER_Y.0..POINTER_Y.1),
            r.random_range(SCROLL_DELTA.0..SCROLL_DELTA.1) as f64,
            r.random_range(MOVE_PAUSE_MS.0..MOVE_PAUSE_MS.1),
            r.random_range(SCROLL_PAUSE_MS.0..SCROLL_PAUSE_MS.1),
        )
    };

    if let Ok(pointer_move) = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseMoved)
        .x(x)
        .y(y)
        .button(MouseButton::None)
        .build()
    {
        let _ = page.execute(pointer_move).await;
    }
    sleep(Duration::from_millis(move_pause)).await;

    if let Ok(wheel) = DispatchMouseEventParams::builder()
        .r#type(DispatchMouseEventType::MouseWheel)
        .x(x)
        .y(y)
        .button(MouseButton::None)
        .delta_x(0.0)
        .delta_y(delta)
        .build()
    {
        let _ = page.execute(wheel).await;
    }
    sleep(Duration::from_millis(scroll_pause)).await;
}
