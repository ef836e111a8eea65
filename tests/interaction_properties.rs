use eframe::egui::{pos2, vec2};
use facet_bubbles::viewport::ViewportConfig;
use facet_bubbles::{DragConfig, DragController, Node, NodeArena, Notifier, ViewportController};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn zoom_target_stays_clamped_and_pan_finite(
        requests in prop::collection::vec((any::<f32>(), 0.0f32..800.0, 0.0f32..600.0), 1..20),
    ) {
        let config = ViewportConfig::default();
        let mut viewport =
            ViewportController::new(config.clone(), vec2(800.0, 600.0), Notifier::disabled());

        for (zoom, x, y) in requests {
            viewport.zoom_to_point(pos2(x, y), zoom);
            let state = viewport.state();
            prop_assert!(state.target_zoom >= config.min_zoom);
            prop_assert!(state.target_zoom <= config.max_zoom);
            prop_assert!(state.target_pan.x.is_finite() && state.target_pan.y.is_finite());

            viewport.tick(1.0 / 60.0);
            prop_assert!(viewport.zoom().is_finite());
        }
    }

    #[test]
    fn slow_release_leaves_node_where_it_was_dropped(
        dx in -1.5f32..1.5,
        dy in -1.5f32..1.5,
        elapsed in 0.02f64..0.1,
        frames in 1usize..30,
    ) {
        let mut arena = NodeArena::new();
        arena.insert(Node::new("bubble", vec2(100.0, 100.0), 20.0, 1.0).unwrap());
        let mut drag = DragController::new(DragConfig::default(), Notifier::disabled());

        drag.pointer_down(&mut arena, "bubble", vec2(100.0, 100.0), 1.0, false).unwrap();
        let release = vec2(100.0 + dx, 100.0 + dy);
        drag.pointer_move(&mut arena, release, 1.0 + elapsed);
        prop_assert_eq!(drag.pointer_up(&mut arena, 1.0 + elapsed), None);

        for _ in 0..frames {
            prop_assert!(!drag.step(&mut arena, 1.0 / 60.0));
        }
        let node = arena.get("bubble").unwrap();
        prop_assert_eq!(node.position, release);
        prop_assert!(!node.throwing);
        prop_assert!(!node.dragging);
        prop_assert!(!drag.is_throwing());
    }
}
