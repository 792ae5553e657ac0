#![no_main]
use appgrid::entity::Entity;
use appgrid::props;
use appgrid::types::EntityId;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 { return; }
    let Ok(s) = std::str::from_utf8(data) else { return };
    let entity = Entity {
        id: EntityId::new(),
        entity_type: "fuzz".into(),
        created: 1_351_234_567_890,
        properties: props! {
            "verb" => "stop",
            "n" => 7,
            "ratio" => f64::NAN,
            "actor" => props! { "name" => "x", "level" => 3 },
        },
    };
    if let Ok(p) = appgrid::query::parse_predicate(s) {
        let _ = appgrid::query::evaluate(&p, &entity);
        let _ = appgrid::query::plan(&p);
    }
});
