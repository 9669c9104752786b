/// Instruction prompt sent with every decode image. The providers return
/// free text; the normalizer owns turning it into a `DecodeResult`, so
/// the prompt only needs to bias the model toward the canonical keys.
pub const DECODE_INSTRUCTIONS: &str = "\
You are a visual style analyst. Examine the attached image and respond \
with a single JSON object, no prose and no markdown, shaped as:\n\
{\n\
  \"styleCodes\": [\"--sref <code>\"],\n\
  \"tags\": [\"<aesthetic tag>\"],\n\
  \"subjects\": [\"<main subject>\"],\n\
  \"prompts\": {\n\
    \"story\": \"<prompt that tells the image's story>\",\n\
    \"mix\": \"<prompt that remixes the style onto a new subject>\",\n\
    \"expand\": \"<prompt that widens the scene>\",\n\
    \"sound\": \"<prompt describing the image as sound>\"\n\
  }\n\
}\n\
Use empty arrays or empty strings when a field does not apply.";
