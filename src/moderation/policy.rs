//! Moderation policy sent to the classification model with every image.

/// Garments the marketplace accepts
pub const ALLOWED_MODEST_ITEMS: &[&str] = &[
    "abaya",
    "hijab",
    "thobe",
    "kaftan",
    "jilbab",
    "niqab",
    "khimar",
    "shayla",
    "modest dress",
    "maxi dress",
    "long sleeve dress",
    "modest gown",
    "evening gown",
    "modest blouse",
    "long sleeve top",
    "tunic",
    "modest shirt",
    "long skirt",
    "maxi skirt",
    "modest pants",
    "wide leg pants",
    "palazzo pants",
    "modest jacket",
    "cardigan",
    "kimono",
    "coat",
    "blazer",
    "scarf",
    "shawl",
    "wrap",
    "prayer dress",
    "burkini",
    "men thobe",
    "dishdasha",
    "kandura",
    "jubba",
    "kurta",
    "formal wear",
    "wedding dress",
    "traditional dress",
    "islamic clothing",
    "muslim clothing",
    "cultural clothing",
    "ethnic wear",
];

/// Garments and traits that are always rejected
pub const PROHIBITED_ITEMS: &[&str] = &[
    "bikini",
    "swimsuit",
    "swimwear",
    "lingerie",
    "underwear",
    "bra",
    "crop top",
    "mini skirt",
    "short shorts",
    "hot pants",
    "low cut",
    "revealing",
    "see through",
    "transparent",
    "sleeveless",
    "tank top",
    "strapless",
    "backless",
    "tight fitting",
    "bodycon",
    "mini dress",
    "party dress revealing",
];

const MODESTY_RULES: &str = "\
- Must cover the body appropriately (arms to wrists, legs to ankles for women's clothing)
- No revealing, tight-fitting, or see-through clothing
- No swimwear, lingerie, or underwear
- Traditional Islamic clothing like abayas, hijabs, thobes is highly preferred
- Men's clothing: thobes, kurtas, modest shirts/pants are allowed
- Women's clothing: must be loose-fitting and cover appropriately";

const RESPONSE_FORMAT: &str = r#"{
    "isApproved": true/false,
    "detectedItems": ["list", "of", "items", "detected"],
    "category": "hijab/abaya/thobe/dress/jewelry/decor/event_wear/prayer_items/accessories/other",
    "confidence": 0.0-1.0,
    "reason": "Clear explanation - if rejected, explain WHY it violates modest dress guidelines. If approved, explain why it fits.",
    "isModest": true/false
}"#;

const REJECTION_EXAMPLES: &str = "\
- Bikinis, swimsuits -> \"This is swimwear which is not appropriate for our modest fashion marketplace\"
- Crop tops -> \"This reveals the midriff which does not meet modest dress requirements\"
- Mini skirts -> \"This is too short and does not meet modest dress length requirements\"
- Sleeveless dresses -> \"This does not cover the arms as required for modest clothing\"
- Tight bodycon dresses -> \"This is too form-fitting for modest fashion standards\"
- Tank tops -> \"This is sleeveless and does not meet modest dress requirements\"";

/// Full instruction text for one image
pub fn moderation_prompt(marketplace: &str) -> String {
    format!(
        "You are a content moderation AI for \"{marketplace}\", a MUSLIM/ISLAMIC MODEST fashion rental marketplace.\n\n\
         Your job is to determine if an uploaded image is appropriate for our platform which ONLY allows modest, Islamic-compliant clothing.\n\n\
         APPROVED items include: {allowed}\n\n\
         STRICTLY PROHIBITED items include: {prohibited}\n\n\
         MODESTY RULES (clothing must meet these criteria):\n{rules}\n\n\
         Analyze this image and respond in JSON format ONLY:\n{format}\n\n\
         BE STRICT: If the item is revealing, tight-fitting, or inappropriate for a Muslim modest fashion marketplace, \
         REJECT IT with isApproved: false and explain why.\n\n\
         Examples of what to REJECT:\n{examples}",
        marketplace = marketplace,
        allowed = ALLOWED_MODEST_ITEMS.join(", "),
        prohibited = PROHIBITED_ITEMS.join(", "),
        rules = MODESTY_RULES,
        format = RESPONSE_FORMAT,
        examples = REJECTION_EXAMPLES,
    )
}
