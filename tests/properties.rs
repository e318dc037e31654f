//! Property tests pinning trie matching behavior.
//!
//! - Static templates round-trip through search and reverse lookup.
//! - Reverse lookup followed by dispatch recovers the arguments.
//! - Wildcard backtracking: which parameter receives which substring when
//!   a deeper template dead-ends under a wildcard sibling.

mod common;

use common::{build, get, tag};
use pathmux::routing::{ApiBuilder, PathArg, Registrar, RouterOptions};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z0-9][a-z0-9_.-]{0,7}"
}

fn segments(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..=max)
}

fn join(segs: &[String]) -> String {
    format!("/{}", segs.join("/"))
}

proptest! {
    #[test]
    fn prop_static_round_trip(registered in segments(5), requested in segments(5)) {
        let literal = join(&registered);
        let mut api = ApiBuilder::new();
        api.get(&literal, tag("static")).unwrap().set_name("static");
        let router = build(api, RouterOptions::default());

        let hit = get(&router, &join(&requested));
        prop_assert_eq!(hit.status == 200, requested == registered);
        prop_assert_eq!(router.path("static", &[]), Some(literal));
    }

    #[test]
    fn prop_reverse_then_dispatch_recovers_arguments(
        a in segment(),
        b in any::<i64>(),
        rest in segments(4),
    ) {
        let mut api = ApiBuilder::new();
        api.get("/r/{a}/{b:int}/{rest:path}", tag("r")).unwrap().set_name("r");
        let router = build(api, RouterOptions::default());

        let mut args = vec![PathArg::from(a.as_str()), PathArg::Int(b)];
        args.extend(rest.iter().map(PathArg::from));
        let path = router.path("r", &args).unwrap();

        let hit = get(&router, &path);
        prop_assert_eq!(hit.route.as_deref(), Some("r"));
        prop_assert_eq!(&hit.params["a"], &a);
        prop_assert_eq!(&hit.params["b"], &b.to_string());
        prop_assert_eq!(&hit.params["rest"], &rest.join("/"));
    }

    #[test]
    fn prop_wildcard_captures_remainder(segs in segments(6)) {
        let mut api = ApiBuilder::new();
        api.get("/files/{f:path}", tag("files")).unwrap();
        let router = build(api, RouterOptions::default());

        let hit = get(&router, &format!("/files{}", join(&segs)));
        prop_assert_eq!(hit.body.as_str(), "files");
        prop_assert_eq!(&hit.params["f"], &segs.join("/"));
    }

    #[test]
    fn prop_backtracking_assigns_remainder_to_wildcard(segs in segments(5)) {
        let mut api = ApiBuilder::new();
        api.get("/hello/{p:path}", tag("wildcard")).unwrap();
        api.get("/hello/{p1}/static/{p2}", tag("deep")).unwrap();
        let router = build(api, RouterOptions::default());

        let hit = get(&router, &format!("/hello{}", join(&segs)));
        if segs.len() == 3 && segs[1] == "static" {
            prop_assert_eq!(hit.body.as_str(), "deep");
            prop_assert_eq!(&hit.params["p1"], &segs[0]);
            prop_assert_eq!(&hit.params["p2"], &segs[2]);
        } else {
            prop_assert_eq!(hit.body.as_str(), "wildcard");
            prop_assert_eq!(hit.params.len(), 1);
            prop_assert_eq!(&hit.params["p"], &segs.join("/"));
        }
    }

    #[test]
    fn prop_backtracking_keeps_captures_above_wildcard(user in segment(), segs in segments(4)) {
        let mut api = ApiBuilder::new();
        api.get("/u/{user}/files/{f:path}", tag("files")).unwrap();
        api.get("/u/{user}/files/{dir}/meta", tag("meta")).unwrap();
        let router = build(api, RouterOptions::default());

        let hit = get(&router, &format!("/u/{}/files{}", user, join(&segs)));
        prop_assert_eq!(&hit.params["user"], &user);
        if segs.len() == 2 && segs[1] == "meta" {
            prop_assert_eq!(hit.body.as_str(), "meta");
            prop_assert_eq!(&hit.params["dir"], &segs[0]);
        } else {
            prop_assert_eq!(hit.body.as_str(), "files");
            prop_assert_eq!(&hit.params["f"], &segs.join("/"));
        }
    }
}
